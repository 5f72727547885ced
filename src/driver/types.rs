use std::fmt;

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Opaque key/value metadata carried by tasks.
pub type Meta = Map<String, JsonValue>;

/// Errors raised by source and destination drivers.
///
/// The first three variants are fatal at startup. The remaining ones are
/// scoped to a single task and never stop the pipeline.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Missing or invalid driver options.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backing store could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The source could not be divided into extraction tasks.
    #[error("planning error: {0}")]
    Planning(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("adaptation error: {0}")]
    Adaptation(String),

    /// Persisting a load task failed. `rows` is the number of rows the
    /// attempt covered, which are all considered lost.
    #[error("persistence error after {rows} row(s): {reason}")]
    Persistence { rows: usize, reason: String },
}

impl DriverError {
    pub fn persistence(rows: usize, reason: impl fmt::Display) -> Self {
        DriverError::Persistence {
            rows,
            reason: reason.to_string(),
        }
    }

    /// Whether this error belongs to the startup taxonomy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DriverError::Configuration(_) | DriverError::Connection(_) | DriverError::Planning(_)
        )
    }
}

/// A single column value. No typing is imposed: drivers hand over raw bytes
/// and destinations decide how to coerce them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Value::Null => &[],
            Value::Bytes(bytes) => bytes,
        }
    }

    /// Raw bytes, `None` for nulls.
    pub fn as_raw(&self) -> Option<&[u8]> {
        match self {
            Value::Null => None,
            Value::Bytes(bytes) => Some(bytes),
        }
    }

    /// Lossy UTF-8 view, `None` for nulls.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bytes(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Bytes(value.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Bytes(value.into_bytes())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// An ordered sequence of column values.
pub type Row = Vec<Value>;

/// An ordered batch of rows read by one extraction task.
pub type ResultSet = Vec<Row>;

/// Describes one chunk of source data to read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionTask {
    pub meta: Meta,
}

impl ExtractionTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.meta.get(key).and_then(JsonValue::as_u64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(JsonValue::as_str)
    }
}

/// A batch of rows plus destination-specific write metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadTask {
    pub meta: Meta,
    pub rows: ResultSet,
}

impl LoadTask {
    pub fn new(rows: ResultSet) -> Self {
        Self {
            meta: Meta::new(),
            rows,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(JsonValue::as_str)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from("abc"), Value::Bytes(b"abc".to_vec()));
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("x")).to_text(), Some("x".to_string()));
        assert!(Value::Null.is_null());
        assert_eq!(Value::Null.as_bytes(), b"");
    }

    #[test]
    fn test_raw_view_keeps_non_utf8_bytes() {
        let value = Value::from(vec![0xff, 0x00, 0xfe]);
        assert_eq!(value.as_raw(), Some(&[0xff, 0x00, 0xfe][..]));
        assert_eq!(Value::Null.as_raw(), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from("42").to_string(), "42");
        assert_eq!(Value::Null.to_string(), "NULL");
    }

    #[test]
    fn test_extraction_task_meta() {
        let task = ExtractionTask::new()
            .with("from", 10u64)
            .with("query", "SELECT 1");

        assert_eq!(task.get_u64("from"), Some(10));
        assert_eq!(task.get_str("query"), Some("SELECT 1"));
        assert_eq!(task.get_u64("missing"), None);
        assert_eq!(task.get_str("from"), None);
    }

    #[test]
    fn test_error_classification() {
        assert!(DriverError::Configuration("x".into()).is_fatal());
        assert!(DriverError::Planning("x".into()).is_fatal());
        assert!(!DriverError::Extraction("x".into()).is_fatal());

        let err = DriverError::persistence(7, "disk full");
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "persistence error after 7 row(s): disk full");
    }
}
