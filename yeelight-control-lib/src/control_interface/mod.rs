use std::io;

use chrono::{Local, NaiveTime, Timelike};
use derivative::Derivative;
use log::{debug, warn};
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tokio::time::sleep;

use crate::led::color::{Color, ColorMatrix};
use crate::util::config::{normalize_address, DeviceConfig};
use crate::util::error::{ControlError, Result};
use crate::util::traits::ResultValues;

use self::command::{Command, Param, Reply, Response};
use self::connection::{is_stale_socket, read_line, Connection};

pub mod command;
pub mod connection;

/// Allowed range for `set_bright`.
pub const BRIGHTNESS_RANGE: std::ops::RangeInclusive<u8> = 1..=100;

/// Allowed range for `set_ct_abx`, in Kelvin.
pub const COLOR_TEMPERATURE_RANGE: std::ops::RangeInclusive<u16> = 1700..=6500;

/// `cron_add` job type that powers the light off.
const CRON_POWER_OFF: i64 = 0;

/// A handle to one device.
///
/// The handle owns at most one socket. With a non-persistent [`DeviceConfig`] every
/// command dials, exchanges one frame pair and closes again. With a persistent one the
/// socket stays open until [`ControlInterface::disconnect`] is called.
///
/// All command methods take `&mut self`, so one handle never has two commands in flight.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ControlInterface {
    address: String,
    config: DeviceConfig,
    #[derivative(Debug = "ignore")]
    connection: Option<Connection>,
}

impl ControlInterface {
    /// Creates a handle for the device at `address` (`host:port`; the default port is
    /// appended when missing). No connection is made yet.
    pub fn new(address: &str, config: DeviceConfig) -> Self {
        ControlInterface {
            address: normalize_address(address),
            config,
            connection: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Dials the device and installs the new socket, replacing any previous one.
    ///
    /// On failure the handle is left without a socket.
    pub async fn connect(&mut self) -> Result<()> {
        self.connection = None;
        let connection =
            Connection::open(&self.address, self.config.effective_timeout()).await?;
        self.connection = Some(connection);
        Ok(())
    }

    /// Closes the current socket, if any. Never fails.
    pub async fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close().await;
        }
    }

    /// Sends `command` and waits for one response line.
    ///
    /// A response that does not arrive within the configured timeout is reported as
    /// an empty [`Response`] and *not* as an error; check [`Response::is_empty`].
    /// Use [`ControlInterface::send_command_outcome`] to get the timeout as a variant.
    pub async fn send_command(&mut self, command: Command) -> Result<Response> {
        self.send_command_outcome(command)
            .await
            .map(Reply::into_response)
    }

    /// Like [`ControlInterface::send_command`], but reports a timeout as [`Reply::TimedOut`].
    pub async fn send_command_outcome(&mut self, mut command: Command) -> Result<Reply> {
        command.generate_id();

        let reused = self.config.persistent && self.connection.is_some();
        if !reused {
            self.connect().await?;
        }

        let mut outcome = self.exchange(&command).await;

        if reused && outcome.as_ref().err().map_or(false, is_stale_error) {
            // The device may close idle connections; one redial, same id.
            debug!(
                "Persistent connection to {} went stale, redialing",
                self.address
            );
            self.connect().await?;
            outcome = self.exchange(&command).await;
        }

        if !self.config.persistent {
            self.disconnect().await;
        } else if matches!(
            outcome,
            Ok(Reply::TimedOut) | Err(ControlError::Io(_)) | Err(ControlError::Read(_))
        ) {
            // A late or partial line would otherwise be read as the next command's answer.
            debug!(
                "Dropping persistent connection to {} after failed exchange",
                self.address
            );
            self.disconnect().await;
        }

        outcome
    }

    /// Builds a command from `method` and `params` and sends it.
    pub async fn call(&mut self, method: &str, params: Vec<Param>) -> Result<Response> {
        self.send_command(Command::new(method, params)).await
    }

    async fn exchange(&mut self, command: &Command) -> Result<Reply> {
        let wait = self.config.effective_timeout();
        let connection = self.connection.as_mut().ok_or_else(|| {
            ControlError::Io(io::Error::new(io::ErrorKind::NotConnected, "not connected"))
        })?;

        let frame = command.to_frame()?;
        debug!(
            "-> {}: {}",
            connection.peer(),
            String::from_utf8_lossy(&frame).trim_end()
        );
        connection.write_frame(&frame).await?;

        let reader = connection.reader();
        let (sender, receiver) = oneshot::channel();
        let reader_task = tokio::spawn(async move {
            let mut reader = reader.lock().await;
            let _ = sender.send(read_line(&mut reader).await);
        });

        tokio::select! {
            received = receiver => match received {
                Ok(Ok(line)) => {
                    debug!("<- {}: {}", self.address, String::from_utf8_lossy(&line).trim_end());
                    let response = Response::from_json(&line)?;
                    if response.id != 0 && response.id != command.id {
                        warn!(
                            "Response id {} does not match request id {}",
                            response.id, command.id
                        );
                    }
                    Ok(Reply::Answered(response))
                }
                Ok(Err(e)) => Err(ControlError::Read(e)),
                Err(_) => Err(ControlError::Read(io::Error::new(
                    io::ErrorKind::Other,
                    "response reader stopped before reporting",
                ))),
            },
            _ = sleep(wait) => {
                reader_task.abort();
                debug!("No response from {} within {:?}", self.address, wait);
                Ok(Reply::TimedOut)
            }
        }
    }

    /// Sends a command and turns an `error` member in the answer into [`ControlError::Device`].
    async fn call_checked(&mut self, method: &str, params: Vec<Param>) -> Result<Response> {
        let response = self.call(method, params).await?;
        match response.error {
            Some(error) => Err(ControlError::Device(error)),
            None => Ok(response),
        }
    }

    /// Appends the transition parameters `"smooth", <ms>`.
    fn with_smooth(&self, mut params: Vec<Param>) -> Vec<Param> {
        params.push("smooth".into());
        params.push(Param::Int(self.config.smooth_millis()));
        params
    }

    pub async fn get_properties(&mut self, names: &[&str]) -> Result<Response> {
        let params = names.iter().map(|&name| Param::from(name)).collect();
        self.call_checked("get_prop", params).await
    }

    pub async fn get_property(&mut self, name: &str) -> Result<Response> {
        self.get_properties(&[name]).await
    }

    /// The value of a single property as text.
    pub async fn get_property_value(&mut self, name: &str) -> Result<String> {
        self.get_property(name)
            .await?
            .result_str(0)
            .ok_or_else(|| ControlError::MissingResult(name.to_string()))
    }

    pub async fn set_color(&mut self, color: Color) -> Result<Response> {
        let params = self.with_smooth(vec![Param::from(color.value())]);
        self.call_checked("set_rgb", params).await
    }

    pub async fn set_hex_color(&mut self, hex: &str) -> Result<Response> {
        let color = Color::from_hex(hex)?;
        self.set_color(color).await
    }

    pub async fn get_color(&mut self) -> Result<Color> {
        let value = self.get_property_value("rgb").await?;
        let color = value
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|packed| Color::new(packed).ok());
        color.ok_or(ControlError::UnexpectedValue {
            property: "rgb".to_string(),
            value,
        })
    }

    pub async fn get_hex_color(&mut self) -> Result<String> {
        Ok(self.get_color().await?.to_hex())
    }

    /// Sets the brightness in percent, 1..=100.
    pub async fn set_bright(&mut self, value: u8) -> Result<Response> {
        if !BRIGHTNESS_RANGE.contains(&value) {
            return Err(ControlError::InvalidArgument(format!(
                "brightness {} outside {:?}",
                value, BRIGHTNESS_RANGE
            )));
        }
        let params = self.with_smooth(vec![Param::from(value)]);
        self.call_checked("set_bright", params).await
    }

    pub async fn get_bright(&mut self) -> Result<u8> {
        let value = self.get_property_value("bright").await?;
        value
            .trim()
            .parse()
            .map_err(|_| ControlError::UnexpectedValue {
                property: "bright".to_string(),
                value: value.clone(),
            })
    }

    /// Sets the white color temperature in Kelvin.
    pub async fn set_color_temperature(&mut self, kelvin: u16) -> Result<Response> {
        if !COLOR_TEMPERATURE_RANGE.contains(&kelvin) {
            return Err(ControlError::InvalidArgument(format!(
                "color temperature {}K outside {:?}",
                kelvin, COLOR_TEMPERATURE_RANGE
            )));
        }
        let params = self.with_smooth(vec![Param::from(kelvin)]);
        self.call_checked("set_ct_abx", params).await
    }

    pub async fn get_color_temperature(&mut self) -> Result<u16> {
        let value = self.get_property_value("ct").await?;
        value
            .trim()
            .parse()
            .map_err(|_| ControlError::UnexpectedValue {
                property: "ct".to_string(),
                value: value.clone(),
            })
    }

    pub async fn set_on(&mut self) -> Result<Response> {
        let params = self.with_smooth(vec!["on".into()]);
        self.call_checked("set_power", params).await
    }

    pub async fn set_off(&mut self) -> Result<Response> {
        let params = self.with_smooth(vec!["off".into()]);
        self.call_checked("set_power", params).await
    }

    pub async fn toggle(&mut self) -> Result<Response> {
        self.call_checked("toggle", vec![]).await
    }

    pub async fn is_on(&mut self) -> Result<bool> {
        Ok(self.get_property_value("power").await? == "on")
    }

    /// Turns the light off after `minutes`.
    pub async fn set_sleep_timer(&mut self, minutes: u32) -> Result<Response> {
        if minutes == 0 {
            return Err(ControlError::InvalidArgument(
                "sleep timer needs at least one minute".to_string(),
            ));
        }
        self.call_checked(
            "cron_add",
            vec![Param::Int(CRON_POWER_OFF), Param::from(minutes)],
        )
        .await
    }

    /**
    Turns the light off at a wall-clock time (`HH:MM` or `HH:MM:SS`, local time).
    A time earlier than now means tomorrow.
     */
    pub async fn set_sleep_timer_at(&mut self, time: &str) -> Result<Response> {
        let target = NaiveTime::parse_from_str(time, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
            .map_err(|e| ControlError::InvalidArgument(format!("invalid time {:?}: {}", time, e)))?;
        let minutes = minutes_until(Local::now().time(), target);
        self.set_sleep_timer(minutes).await
    }

    /// Switches an LED-matrix device into direct mode, required before `update_leds`.
    pub async fn activate_direct_mode(&mut self) -> Result<Response> {
        let mut mode = Map::new();
        mode.insert("mode".to_string(), Value::String("direct".to_string()));
        self.call_checked("activate_fx_mode", vec![Param::Object(mode)])
            .await
    }

    /// Sends one frame to an LED-matrix device.
    pub async fn update_leds(&mut self, matrix: &ColorMatrix) -> Result<Response> {
        self.call_checked("update_leds", vec![Param::Str(matrix.to_compact_text())])
            .await
    }

    /// Activates direct mode and then shows `matrix`.
    pub async fn show_matrix(&mut self, matrix: &ColorMatrix) -> Result<Response> {
        self.activate_direct_mode().await?;
        self.update_leds(matrix).await
    }
}

/// A failed write, or a read that ended before any byte of an answer.
fn is_stale_error(error: &ControlError) -> bool {
    match error {
        ControlError::Io(_) => true,
        ControlError::Read(e) => is_stale_socket(e),
        _ => false,
    }
}

/// Whole minutes from `now` until the next occurrence of `target`, rounded up, at least 1.
pub fn minutes_until(now: NaiveTime, target: NaiveTime) -> u32 {
    const DAY: u32 = 24 * 60 * 60;
    let now = now.num_seconds_from_midnight();
    let target = target.num_seconds_from_midnight();
    let seconds = (target + DAY - now) % DAY;
    seconds.div_ceil(60).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn time(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_minutes_until() {
        assert_eq!(minutes_until(time(22, 0, 0), time(23, 30, 0)), 90);
        assert_eq!(minutes_until(time(23, 30, 0), time(0, 15, 0)), 45);
        assert_eq!(minutes_until(time(10, 0, 30), time(10, 5, 0)), 5);
        assert_eq!(minutes_until(time(10, 0, 0), time(10, 0, 0)), 1);
    }

    #[test]
    fn test_new_normalizes_address() {
        let control = ControlInterface::new("192.168.1.30", DeviceConfig::default());
        assert_eq!(control.address(), "192.168.1.30:55443");
        assert!(!control.is_connected());
    }

    #[test]
    fn test_with_smooth_appends_transition() {
        let config = DeviceConfig::default().with_smooth(Duration::from_millis(500));
        let control = ControlInterface::new("127.0.0.1:1", config);
        let params = control.with_smooth(vec!["on".into()]);
        assert_eq!(
            params,
            vec![Param::from("on"), Param::from("smooth"), Param::Int(500)]
        );
    }

    #[tokio::test]
    async fn test_argument_validation_happens_before_dialing() {
        let mut control = ControlInterface::new("127.0.0.1:1", DeviceConfig::default());
        assert!(matches!(
            control.set_bright(0).await,
            Err(ControlError::InvalidArgument(_))
        ));
        assert!(matches!(
            control.set_bright(101).await,
            Err(ControlError::InvalidArgument(_))
        ));
        assert!(matches!(
            control.set_color_temperature(1000).await,
            Err(ControlError::InvalidArgument(_))
        ));
        assert!(matches!(
            control.set_hex_color("#nothex").await,
            Err(ControlError::Parse { .. })
        ));
        assert!(matches!(
            control.set_sleep_timer(0).await,
            Err(ControlError::InvalidArgument(_))
        ));
        assert!(!control.is_connected());
    }
}
