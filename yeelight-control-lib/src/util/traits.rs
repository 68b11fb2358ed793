use serde_json::Value;

/// Read access to the positional values of a response `result`.
///
/// The device answers most commands with `["ok"]` and `get_prop` with one string per
/// requested property, in request order. Numbers are sent as strings too, e.g.
/// `["16711680"]` for `rgb`, but some firmwares send bare numbers, so both are accepted.
pub trait ResultValues {
    /// The raw `result` array, if the response carried one.
    fn result_values(&self) -> Option<&[Value]>;

    /// The value at `index` rendered as text.
    fn result_str(&self, index: usize) -> Option<String> {
        match self.result_values()?.get(index)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// The value at `index` parsed as a decimal integer.
    fn result_i64(&self, index: usize) -> Option<i64> {
        self.result_str(index)?.trim().parse().ok()
    }

    /// True when the first result value is `"ok"`, the acknowledgement for set commands.
    fn is_ok(&self) -> bool {
        self.result_str(0).as_deref() == Some("ok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Values(Option<Vec<Value>>);

    impl ResultValues for Values {
        fn result_values(&self) -> Option<&[Value]> {
            self.0.as_deref()
        }
    }

    #[test]
    fn test_result_accessors() {
        let values = Values(Some(vec![json!("on"), json!("16711680"), json!(42)]));
        assert_eq!(values.result_str(0).as_deref(), Some("on"));
        assert_eq!(values.result_i64(1), Some(16_711_680));
        assert_eq!(values.result_i64(2), Some(42));
        assert_eq!(values.result_str(3), None);
        assert!(!values.is_ok());
    }

    #[test]
    fn test_is_ok() {
        assert!(Values(Some(vec![json!("ok")])).is_ok());
        assert!(!Values(None).is_ok());
    }
}
