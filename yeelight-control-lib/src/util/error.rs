use std::io;

use thiserror::Error;

/// Errors returned by the control interface and the color codec.
///
/// A response that did not arrive in time is *not* an error: the engine reports it
/// as an empty [`crate::control_interface::command::Response`] (or as
/// [`crate::control_interface::command::Reply::TimedOut`] when the tagged variant is used).
#[derive(Debug, Error)]
pub enum ControlError {
    /// Dialing the device failed or did not finish within the configured timeout.
    #[error("Failed to connect to {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Writing a command frame to an established socket failed.
    #[error("Failed to write command: {0}")]
    Io(#[source] io::Error),

    /// The background reader failed before a full line arrived.
    #[error("Failed to read response: {0}")]
    Read(#[source] io::Error),

    /// A command could not be turned into JSON.
    #[error("Failed to encode command: {0}")]
    Encoding(#[source] serde_json::Error),

    /// The device sent a line that is not a valid response object.
    #[error("Failed to decode response: {0}")]
    Decoding(#[source] serde_json::Error),

    /// Hex color text could not be parsed.
    #[error("Invalid hex color {text:?}: {reason}")]
    Parse { text: String, reason: String },

    /// A wrapper method was called with a value the device does not accept.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The device answered with an `error` member.
    #[error("Device returned an error: {0}")]
    Device(serde_json::Value),

    /// A property value could not be interpreted.
    #[error("Unexpected value {value:?} for property {property}")]
    UnexpectedValue { property: String, value: String },

    /// A getter expected a result value but none was received.
    #[error("No result received for {0}")]
    MissingResult(String),
}

impl ControlError {
    pub(crate) fn parse(text: &str, reason: impl Into<String>) -> Self {
        ControlError::Parse {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = ControlError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_message() {
        let err = ControlError::Connection {
            address: "10.0.0.2:55443".to_string(),
            source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to connect to 10.0.0.2:55443: connect timed out"
        );
    }

    #[test]
    fn test_parse_error_message() {
        let err = ControlError::parse("#zz", "invalid digit");
        assert_eq!(err.to_string(), "Invalid hex color \"#zz\": invalid digit");
    }
}
