// src/driver/options.rs

use serde_json::{Map, Value as JsonValue};

use super::types::DriverError;

/// Free-form per-driver options taken from the configuration file.
pub type Options = Map<String, JsonValue>;

/// Typed lookups over [`Options`].
///
/// Absent keys yield `None`; keys present with the wrong JSON type are a
/// configuration error.
pub trait OptionsExt {
    fn str_opt(&self, key: &str) -> Result<Option<&str>, DriverError>;
    fn u64_opt(&self, key: &str) -> Result<Option<u64>, DriverError>;
    fn bool_opt(&self, key: &str) -> Result<Option<bool>, DriverError>;
    fn u64_list_opt(&self, key: &str) -> Result<Option<Vec<u64>>, DriverError>;

    fn require_str(&self, key: &str) -> Result<&str, DriverError> {
        match self.str_opt(key)? {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(DriverError::Configuration(format!(
                "missing required option `{}`",
                key
            ))),
        }
    }
}

fn wrong_type(key: &str, expected: &str) -> DriverError {
    DriverError::Configuration(format!("option `{}` must be {}", key, expected))
}

impl OptionsExt for Options {
    fn str_opt(&self, key: &str) -> Result<Option<&str>, DriverError> {
        match self.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(wrong_type(key, "a string")),
        }
    }

    fn u64_opt(&self, key: &str) -> Result<Option<u64>, DriverError> {
        match self.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            // JSON configs commonly carry floats for integral values.
            Some(JsonValue::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .map(Some)
                .ok_or_else(|| wrong_type(key, "a non-negative integer")),
            Some(_) => Err(wrong_type(key, "a non-negative integer")),
        }
    }

    fn bool_opt(&self, key: &str) -> Result<Option<bool>, DriverError> {
        match self.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(wrong_type(key, "a boolean")),
        }
    }

    fn u64_list_opt(&self, key: &str) -> Result<Option<Vec<u64>>, DriverError> {
        match self.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| item.as_u64().ok_or_else(|| wrong_type(key, "a list of integers")))
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(wrong_type(key, "a list of integers")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: JsonValue) -> Options {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_typed_lookups() {
        let opts = options(json!({
            "path": "/tmp/in.csv",
            "limit": 100.0,
            "truncate": true,
            "columns": [1, 3],
        }));

        assert_eq!(opts.str_opt("path").unwrap(), Some("/tmp/in.csv"));
        assert_eq!(opts.u64_opt("limit").unwrap(), Some(100));
        assert_eq!(opts.bool_opt("truncate").unwrap(), Some(true));
        assert_eq!(opts.u64_list_opt("columns").unwrap(), Some(vec![1, 3]));
        assert_eq!(opts.u64_opt("offset").unwrap(), None);
    }

    #[test]
    fn test_wrong_types_are_configuration_errors() {
        let opts = options(json!({ "limit": "ten", "truncate": 1 }));

        assert!(matches!(
            opts.u64_opt("limit"),
            Err(DriverError::Configuration(_))
        ));
        assert!(matches!(
            opts.bool_opt("truncate"),
            Err(DriverError::Configuration(_))
        ));
    }

    #[test]
    fn test_require_str() {
        let opts = options(json!({ "path": "" }));

        let err = opts.require_str("path").unwrap_err();
        assert!(err.to_string().contains("missing required option `path`"));
        assert!(opts.require_str("table").is_err());
    }
}
