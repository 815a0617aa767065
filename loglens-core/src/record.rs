use chrono::{DateTime, Local};
use serde_json::Value;
use uuid::Uuid;

use crate::error::RecordError;

/// one validated structured log record
///
/// records are immutable after construction and travel as `Arc<Record>`
/// from the ingest task through the hub to every viewer
#[derive(Debug, Clone)]
pub struct Record {
    id: Uuid,
    received_at: DateTime<Local>,
    raw: String,
    value: Value,
}

impl Record {
    /// validate one line of NDJSON and build a record from it
    ///
    /// the line must be a JSON object or `null`; blank lines are malformed.
    /// trailing line terminators are stripped from the stored raw text
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let raw = line.trim_end_matches(['\r', '\n']);
        let value: Value = serde_json::from_str(raw).map_err(RecordError::Malformed)?;

        // `null` is an empty mapping
        if !(value.is_object() || value.is_null()) {
            return Err(RecordError::NotAnObject {
                kind: value_kind(&value),
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            received_at: Local::now(),
            raw: raw.to_string(),
            value,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn received_at(&self) -> DateTime<Local> {
        self.received_at
    }

    /// the validated line exactly as it arrived
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// look up a top-level string field, e.g. `level` or `message`
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(Value::as_str)
    }

    /// render as 2-space indented JSON
    pub fn to_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.value)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let record = Record::parse(r#"{"level":"info","message":"start"}"#).unwrap();
        assert_eq!(record.get_str("level"), Some("info"));
        assert_eq!(record.get_str("message"), Some("start"));
        assert_eq!(record.raw(), r#"{"level":"info","message":"start"}"#);
    }

    #[test]
    fn test_parse_strips_line_terminators() {
        let record = Record::parse("{\"a\":1}\r\n").unwrap();
        assert_eq!(record.raw(), "{\"a\":1}");
    }

    #[test]
    fn test_parse_malformed() {
        let err = Record::parse("not json").unwrap_err();
        assert!(matches!(err, RecordError::Malformed(_)));
    }

    #[test]
    fn test_parse_truncated_object() {
        let err = Record::parse(r#"{"level":"info""#).unwrap_err();
        assert!(matches!(err, RecordError::Malformed(_)));
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        for (line, kind) in [("42", "number"), ("[1,2]", "array"), ("\"hi\"", "string")] {
            match Record::parse(line) {
                Err(RecordError::NotAnObject { kind: got }) => assert_eq!(got, kind),
                other => panic!("expected NotAnObject for {line}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_key_order_is_preserved() {
        let record = Record::parse(r#"{"zeta":1,"alpha":2,"mid":3}"#).unwrap();
        let keys: Vec<&str> = record
            .value()
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_pretty_uses_two_space_indent() {
        let record = Record::parse(r#"{"level":"info","message":"start"}"#).unwrap();
        assert_eq!(
            record.to_pretty().unwrap(),
            "{\n  \"level\": \"info\",\n  \"message\": \"start\"\n}"
        );
    }

    #[test]
    fn test_pretty_round_trip() {
        let line = r#"{"level":"error","ctx":{"retries":3,"tags":["a",null,true]},"latency":1.5}"#;
        let record = Record::parse(line).unwrap();
        let reparsed: Value = serde_json::from_str(&record.to_pretty().unwrap()).unwrap();
        assert_eq!(&reparsed, record.value());
    }

    #[test]
    fn test_parse_null_is_accepted() {
        let record = Record::parse("null\n").unwrap();
        assert!(record.value().is_null());
        assert_eq!(record.get_str("level"), None);
        assert_eq!(record.to_pretty().unwrap(), "null");
    }

    #[test]
    fn test_blank_lines_are_malformed() {
        for line in ["", "\n", "   ", "\t\r\n"] {
            assert!(
                matches!(Record::parse(line), Err(RecordError::Malformed(_))),
                "{line:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Record::parse("{}").unwrap();
        let b = Record::parse("{}").unwrap();
        assert_ne!(a.id(), b.id());
    }
}
