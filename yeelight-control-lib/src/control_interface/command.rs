use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::util::error::{ControlError, Result};
use crate::util::traits::ResultValues;

/// Terminator appended to every outbound frame.
pub const FRAME_TERMINATOR: &[u8] = b"\r\n";

/// A single positional parameter of a command.
///
/// Serialized untagged, so a parameter list becomes a plain JSON array of mixed types,
/// e.g. `[16711680, "smooth", 200]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Int(i64),
    Str(String),
    Object(Map<String, Value>),
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Param::Int(value as i64)
    }
}

impl From<u32> for Param {
    fn from(value: u32) -> Self {
        Param::Int(value as i64)
    }
}

impl From<u16> for Param {
    fn from(value: u16) -> Self {
        Param::Int(value as i64)
    }
}

impl From<u8> for Param {
    fn from(value: u8) -> Self {
        Param::Int(value as i64)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Str(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Str(value)
    }
}

impl From<Map<String, Value>> for Param {
    fn from(value: Map<String, Value>) -> Self {
        Param::Object(value)
    }
}

impl TryFrom<Value> for Param {
    type Error = ControlError;

    /// Accepts integers, strings and objects; anything else has no wire form.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => n.as_i64().map(Param::Int).ok_or_else(|| {
                ControlError::InvalidArgument(format!("{} is not an integer parameter", n))
            }),
            Value::String(s) => Ok(Param::Str(s)),
            Value::Object(map) => Ok(Param::Object(map)),
            other => Err(ControlError::InvalidArgument(format!(
                "unsupported parameter {}",
                other
            ))),
        }
    }
}

/// A request to the device: `{"id":..,"method":..,"params":[..]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub id: i32,
    pub method: String,
    pub params: Vec<Param>,
}

impl Command {
    /// Builds a command with no correlation ID yet; one is assigned when it is sent.
    pub fn new(method: impl Into<String>, params: Vec<Param>) -> Self {
        Command {
            id: 0,
            method: method.into(),
            params,
        }
    }

    /// Assigns a random non-zero 31-bit ID if none is set. Calling it again is a no-op.
    pub fn generate_id(&mut self) -> i32 {
        if self.id == 0 {
            self.id = rand::thread_rng().gen_range(1..=i32::MAX);
        }
        self.id
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(ControlError::Encoding)
    }

    /// The JSON object followed by `\r\n`, ready to be written to the socket.
    pub fn to_frame(&self) -> Result<Bytes> {
        let json = self.to_json()?;
        let mut frame = BytesMut::with_capacity(json.len() + FRAME_TERMINATOR.len());
        frame.put_slice(&json);
        frame.put_slice(FRAME_TERMINATOR);
        Ok(frame.freeze())
    }
}

/// A reply from the device.
///
/// An empty response (`id == 0`, no `result`, no `error`) means nothing arrived in
/// time, or the device sent a blank line. Use [`Response::is_empty`] to tell it apart
/// from a real answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Response {
    /// Decodes one line as read from the socket, terminator included.
    ///
    /// Only the line terminator is stripped; a line that is empty after that yields
    /// an empty response.
    pub fn from_json(line: &[u8]) -> Result<Self> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return Ok(Response::default());
        }
        serde_json::from_slice(line).map_err(ControlError::Decoding)
    }

    pub fn is_empty(&self) -> bool {
        self.id == 0 && self.result.is_none() && self.error.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The `message` member of the error object, if the device sent one.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref()?.get("message")?.as_str()
    }
}

impl ResultValues for Response {
    fn result_values(&self) -> Option<&[Value]> {
        self.result.as_deref()
    }
}

/// Outcome of a command exchange when the caller wants the timeout made explicit.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A line arrived and was decoded.
    Answered(Response),
    /// The response wait elapsed before a line arrived.
    TimedOut,
}

impl Reply {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Reply::TimedOut)
    }

    /// Collapses a timeout into an empty response.
    pub fn into_response(self) -> Response {
        match self {
            Reply::Answered(response) => response,
            Reply::TimedOut => Response::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_command_has_no_id() {
        let command = Command::new("toggle", vec![]);
        assert_eq!(command.id, 0);
        assert_eq!(command.method, "toggle");
        assert!(command.params.is_empty());
    }

    #[test]
    fn test_generate_id_is_idempotent() {
        let mut command = Command::new("toggle", vec![]);
        let first = command.generate_id();
        assert!(first > 0);
        let second = command.generate_id();
        assert_eq!(first, second);
        assert_eq!(command.id, first);
    }

    #[test]
    fn test_generate_id_keeps_preset_id() {
        let mut command = Command::new("toggle", vec![]);
        command.id = 42;
        assert_eq!(command.generate_id(), 42);
        assert_eq!(command.id, 42);
    }

    #[test]
    fn test_serialize_mixed_params() {
        let mut mode = Map::new();
        mode.insert("mode".to_string(), json!("direct"));
        let mut command = Command::new(
            "set_rgb",
            vec![Param::from(16_711_680u32), "smooth".into(), 200i64.into()],
        );
        command.id = 7;

        let value: Value = serde_json::from_slice(&command.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"id": 7, "method": "set_rgb", "params": [16711680, "smooth", 200]})
        );

        let command = Command::new("activate_fx_mode", vec![mode.into()]);
        let value: Value = serde_json::from_slice(&command.to_json().unwrap()).unwrap();
        assert_eq!(value["params"], json!([{"mode": "direct"}]));
    }

    #[test]
    fn test_frame_ends_with_crlf() {
        let mut command = Command::new("toggle", vec![]);
        command.id = 1;
        let frame = command.to_frame().unwrap();
        assert_eq!(
            &frame[..],
            &b"{\"id\":1,\"method\":\"toggle\",\"params\":[]}\r\n"[..]
        );
    }

    #[test]
    fn test_param_from_value() {
        assert_eq!(Param::try_from(json!(5)).unwrap(), Param::Int(5));
        assert_eq!(
            Param::try_from(json!("on")).unwrap(),
            Param::Str("on".to_string())
        );
        assert!(matches!(
            Param::try_from(json!({"a": 1})).unwrap(),
            Param::Object(_)
        ));
        assert!(Param::try_from(json!(1.5)).is_err());
        assert!(Param::try_from(json!(null)).is_err());
        assert!(Param::try_from(json!([1])).is_err());
    }

    #[test]
    fn test_decode_result() {
        let response = Response::from_json(b"{\"id\":3,\"result\":[\"ok\"]}\r\n").unwrap();
        assert_eq!(response.id, 3);
        assert!(response.is_ok());
        assert!(!response.is_error());
        assert!(!response.is_empty());
    }

    #[test]
    fn test_decode_error() {
        let response = Response::from_json(
            b"{\"id\":4,\"error\":{\"code\":-1,\"message\":\"unsupported method\"}}\n",
        )
        .unwrap();
        assert!(response.is_error());
        assert_eq!(response.error_message(), Some("unsupported method"));
        assert!(response.result.is_none());
    }

    #[test]
    fn test_decode_blank_line_is_empty() {
        assert!(Response::from_json(b"\n").unwrap().is_empty());
        assert!(Response::from_json(b"\r\n").unwrap().is_empty());
        assert!(Response::from_json(b"").unwrap().is_empty());
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            Response::from_json(b"{\"id\":1,\"result\":[\n"),
            Err(ControlError::Decoding(_))
        ));
        assert!(matches!(
            Response::from_json(b"not json\n"),
            Err(ControlError::Decoding(_))
        ));
    }

    #[test]
    fn test_reply_into_response() {
        assert!(Reply::TimedOut.into_response().is_empty());
        assert!(Reply::TimedOut.is_timed_out());
        let response = Response {
            id: 9,
            result: Some(vec![json!("ok")]),
            error: None,
        };
        assert_eq!(Reply::Answered(response.clone()).into_response(), response);
    }
}
