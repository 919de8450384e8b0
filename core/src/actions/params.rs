//! Lenient decoding of action parameters.
//!
//! The platform is loose about JSON types: numbers arrive as strings, string
//! arrays as one comma-separated string, and absent keys as `null`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `config` object of a prepare request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionParams(Map<String, Value>);

impl ActionParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for callers assembling requests by hand.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// String value; numbers and booleans are rendered, absent is empty.
    pub fn string(&self, key: &str) -> String {
        match self.get(key) {
            Some(value) => value_to_string(value),
            None => String::new(),
        }
    }

    /// String array; a plain string is split on commas. Blank entries are
    /// dropped.
    pub fn string_array(&self, key: &str) -> Vec<String> {
        let raw: Vec<String> = match self.get(key) {
            Some(Value::Array(items)) => items.iter().map(value_to_string).collect(),
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            Some(other) => vec![value_to_string(other)],
            None => Vec::new(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Unsigned integer, or `None` when absent or not a number.
    ///
    /// Fractional values are truncated.
    pub fn u64(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<u64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64))
            }
            _ => None,
        }
    }

    pub fn u64_or(&self, key: &str, default: u64) -> u64 {
        self.u64(key).unwrap_or(default)
    }

    /// Boolean; accepts `"true"`/`"false"` strings.
    pub fn bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => default,
            },
            _ => default,
        }
    }

    /// Milliseconds as a duration; absent is zero.
    pub fn duration_ms(&self, key: &str) -> Duration {
        Duration::from_millis(self.u64_or(key, 0))
    }
}

impl From<Map<String, Value>> for ActionParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> ActionParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_string_accessor() {
        let p = params(json!({"process": "nginx", "pid": 42, "empty": null}));
        assert_eq!(p.string("process"), "nginx");
        assert_eq!(p.string("pid"), "42");
        assert_eq!(p.string("empty"), "");
        assert_eq!(p.string("missing"), "");
    }

    #[test]
    fn test_string_array_accessor() {
        let p = params(json!({
            "ip": ["10.0.0.1", " ", "10.0.0.2"],
            "port": "80, 443",
            "hostname": null
        }));
        assert_eq!(p.string_array("ip"), vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(p.string_array("port"), vec!["80", "443"]);
        assert!(p.string_array("hostname").is_empty());
    }

    #[test]
    fn test_numbers_from_strings() {
        let p = params(json!({"duration": "30000", "delay": 500, "load": 12.7, "bad": "x"}));
        assert_eq!(p.u64("duration"), Some(30_000));
        assert_eq!(p.u64("delay"), Some(500));
        assert_eq!(p.u64("load"), Some(12));
        assert_eq!(p.u64("bad"), None);
        assert_eq!(p.u64_or("missing", 7), 7);
        assert_eq!(p.duration_ms("duration"), Duration::from_secs(30));
    }

    #[test]
    fn test_bool_accessor() {
        let p = params(json!({"a": true, "b": "false", "c": "TRUE", "d": 1}));
        assert!(p.bool("a", false));
        assert!(!p.bool("b", true));
        assert!(p.bool("c", false));
        assert!(p.bool("d", true));
        assert!(!p.bool("missing", false));
    }
}
