//! Ingest request validation
//!
//! Producers are untrusted and loosely typed, so fields are coerced rather
//! than rejected. The only hard requirement is a truthy `valueHash`.

use std::fmt;

use serde_json::{Map, Value};

use crate::types::{ChangeEvent, DEFAULT_KEY, DEFAULT_SOURCE, UNKNOWN_COMPONENT};
use crate::utils::parse_client_timestamp;

/// Why an ingest body was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    MissingValueHash,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::MissingValueHash => f.write_str("valueHash is required"),
        }
    }
}

impl std::error::Error for InvalidReason {}

/// Outcome of validating one ingest body
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(ChangeEvent),
    Invalid(InvalidReason),
}

/// Validate a raw ingest body and stamp it with `server_ts`.
///
/// Any client-supplied `serverTs` is ignored. A body that is not a JSON
/// object is treated as empty.
pub fn validate_ingest(body: &Value, server_ts: String) -> Validation {
    let empty = Map::new();
    let fields = body.as_object().unwrap_or(&empty);
    let field = |name: &str| fields.get(name).unwrap_or(&Value::Null);

    let hash = field("valueHash");
    if !is_truthy(hash) {
        return Validation::Invalid(InvalidReason::MissingValueHash);
    }

    Validation::Valid(ChangeEvent {
        component_name: coerce_string(field("componentName"), UNKNOWN_COMPONENT),
        key: coerce_string(field("key"), DEFAULT_KEY),
        value: field("value").clone(),
        value_hash: coerce_string(hash, ""),
        is_error: is_truthy(field("isError")),
        meta: field("meta").as_object().cloned(),
        client_ts: Some(field("clientTs"))
            .filter(|ts| is_truthy(ts))
            .and_then(parse_client_timestamp),
        server_ts,
        source: coerce_string(field("source"), DEFAULT_SOURCE),
    })
}

/// Loose truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy,
/// everything else (including empty arrays and objects) is truthy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Coerce a loosely typed field to a string; `null` and `""` give `default`
pub fn coerce_string(value: &Value, default: &str) -> String {
    match value {
        Value::Null => default.to_string(),
        Value::String(s) if s.is_empty() => default.to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TS: &str = "2024-01-01T00:00:00.000Z";

    fn valid(body: Value) -> ChangeEvent {
        match validate_ingest(&body, TS.to_string()) {
            Validation::Valid(event) => event,
            Validation::Invalid(reason) => panic!("unexpected rejection: {reason}"),
        }
    }

    #[test]
    fn test_missing_or_falsy_hash_is_rejected() {
        for body in [
            json!({}),
            json!({"value": 1}),
            json!({"valueHash": null}),
            json!({"valueHash": ""}),
            json!({"valueHash": 0}),
            json!({"valueHash": false}),
            json!("not an object"),
            Value::Null,
        ] {
            assert_eq!(
                validate_ingest(&body, TS.to_string()),
                Validation::Invalid(InvalidReason::MissingValueHash),
                "{body}"
            );
        }
        assert_eq!(InvalidReason::MissingValueHash.to_string(), "valueHash is required");
    }

    #[test]
    fn test_defaults_are_applied() {
        let event = valid(json!({"valueHash": "h"}));
        assert_eq!(event.component_name, "UnknownComponent");
        assert_eq!(event.key, "state");
        assert_eq!(event.value, Value::Null);
        assert!(!event.is_error);
        assert_eq!(event.meta, None);
        assert_eq!(event.client_ts, None);
        assert_eq!(event.server_ts, TS);
        assert_eq!(event.source, "frontend");
    }

    #[test]
    fn test_fields_are_coerced() {
        let event = valid(json!({
            "componentName": 42,
            "key": "",
            "value": {"a": [1, 2]},
            "valueHash": 7,
            "isError": "yes",
            "meta": [1],
            "clientTs": "garbage",
            "serverTs": "1999-01-01T00:00:00.000Z",
            "source": "backend",
        }));
        assert_eq!(event.component_name, "42");
        assert_eq!(event.key, "state");
        assert_eq!(event.value, json!({"a": [1, 2]}));
        assert_eq!(event.value_hash, "7");
        assert!(event.is_error);
        assert_eq!(event.meta, None);
        assert_eq!(event.client_ts, None);
        assert_eq!(event.server_ts, TS);
        assert_eq!(event.source, "backend");
    }

    #[test]
    fn test_client_timestamp_is_normalized() {
        let event = valid(json!({"valueHash": "h", "clientTs": 1_700_000_000_000i64}));
        assert_eq!(event.client_ts.as_deref(), Some("2023-11-14T22:13:20.000Z"));

        let event = valid(json!({"valueHash": "h", "clientTs": "2024-03-01T10:00:00+02:00"}));
        assert_eq!(event.client_ts.as_deref(), Some("2024-03-01T08:00:00.000Z"));

        let event = valid(json!({"valueHash": "h", "clientTs": 0}));
        assert_eq!(event.client_ts, None);
    }

    #[test]
    fn test_object_meta_is_kept() {
        let event = valid(json!({"valueHash": "h", "meta": {"prev": 1}}));
        assert_eq!(event.meta.unwrap().get("prev"), Some(&json!(1)));
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
        assert!(!is_truthy(&json!(0.0)));
    }
}
