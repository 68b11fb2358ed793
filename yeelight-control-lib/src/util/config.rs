use std::time::Duration;

/// Used for both connecting and waiting for a response when no timeout is set.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Transition length appended as `"smooth", <ms>` to transition-capable commands.
pub const DEFAULT_SMOOTH: Duration = Duration::from_millis(200);

/// Default LAN control port of Yeelight devices.
pub const DEFAULT_PORT: u16 = 55443;

/// Connection policy and defaults for a single device.
///
/// | field        | default | meaning                                                 |
/// |--------------|---------|---------------------------------------------------------|
/// | `persistent` | `false` | keep the socket open across commands                    |
/// | `timeout`    | 3 s     | connect timeout and response wait; zero means "default" |
/// | `smooth`     | 200 ms  | transition duration for `set_*` commands                |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub persistent: bool,
    pub timeout: Duration,
    pub smooth: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            persistent: false,
            timeout: DEFAULT_TIMEOUT,
            smooth: DEFAULT_SMOOTH,
        }
    }
}

impl DeviceConfig {
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_smooth(mut self, smooth: Duration) -> Self {
        self.smooth = smooth;
        self
    }

    /// The timeout actually applied. A zero timeout falls back to [`DEFAULT_TIMEOUT`].
    pub fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }

    /// Smoothing duration in whole milliseconds, as the device expects it.
    pub fn smooth_millis(&self) -> i64 {
        self.smooth.as_millis().min(i64::MAX as u128) as i64
    }
}

/// Appends the default port when `address` has none.
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();
    let has_port = match address.rsplit_once(':') {
        // Bracketed IPv6 literals carry their port after the closing bracket.
        Some((host, port)) => {
            !port.is_empty()
                && port.chars().all(|c| c.is_ascii_digit())
                && (!host.contains(':') || host.ends_with(']'))
        }
        None => false,
    };
    if has_port {
        address.to_string()
    } else {
        format!("{}:{}", address, DEFAULT_PORT)
    }
}
