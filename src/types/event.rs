//! Change event types
//!
//! A `ChangeEvent` is the unit written to the log, one JSON object per line.
//! Field names are camelCase on the wire and on disk.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A recorded state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Logical owner of the tracked value
    pub component_name: String,

    /// Slot name within the owner
    pub key: String,

    /// New value, any JSON shape including `null`
    #[serde(default)]
    pub value: Value,

    /// Fingerprint of `value`, used for dedup only
    pub value_hash: String,

    /// Marks an error-state transition
    #[serde(default)]
    pub is_error: bool,

    /// Free-form context such as the previous value
    #[serde(default)]
    pub meta: Option<Map<String, Value>>,

    /// Producer-side timestamp (ISO-8601)
    #[serde(default)]
    pub client_ts: Option<String>,

    /// Server-assigned timestamp (ISO-8601), the only ordering key
    pub server_ts: String,

    /// Origin tag, e.g. "frontend" or "backend"
    pub source: String,
}

impl ChangeEvent {
    /// Body sent to `POST /ingest`. `serverTs` is never sent; the server
    /// assigns its own.
    pub fn ingest_body(&self) -> IngestBody<'_> {
        IngestBody {
            component_name: &self.component_name,
            key: &self.key,
            value: &self.value,
            value_hash: &self.value_hash,
            is_error: self.is_error,
            meta: self.meta.as_ref(),
            client_ts: self.client_ts.as_deref(),
            source: &self.source,
        }
    }
}

/// Borrowed ingest request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestBody<'a> {
    pub component_name: &'a str,
    pub key: &'a str,
    pub value: &'a Value,
    pub value_hash: &'a str,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ts: Option<&'a str>,
    pub source: &'a str,
}

/// Latest known state of a single key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentState {
    pub key: String,
    pub value: Value,
    pub is_error: bool,
    pub meta: Option<Map<String, Value>>,
    pub server_ts: String,
}

impl From<ChangeEvent> for ComponentState {
    fn from(event: ChangeEvent) -> Self {
        Self {
            key: event.key,
            value: event.value,
            is_error: event.is_error,
            meta: event.meta,
            server_ts: event.server_ts,
        }
    }
}

/// Latest known states for one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestComponentStates {
    pub component_name: String,
    pub states: Vec<ComponentState>,
}

impl LatestComponentStates {
    /// Group winning events by component.
    ///
    /// Expects at most one event per (component, key). Components come back
    /// sorted ascending, and so do the keys within each component.
    pub fn group(events: impl IntoIterator<Item = ChangeEvent>) -> Vec<LatestComponentStates> {
        let mut grouped: BTreeMap<String, Vec<ComponentState>> = BTreeMap::new();
        for event in events {
            grouped
                .entry(event.component_name.clone())
                .or_default()
                .push(ComponentState::from(event));
        }

        grouped
            .into_iter()
            .map(|(component_name, mut states)| {
                states.sort_by(|a, b| a.key.cmp(&b.key));
                LatestComponentStates {
                    component_name,
                    states,
                }
            })
            .collect()
    }

    /// Find the state for `key`
    pub fn state(&self, key: &str) -> Option<&ComponentState> {
        self.states.iter().find(|s| s.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(component: &str, key: &str, value: Value) -> ChangeEvent {
        ChangeEvent {
            component_name: component.to_string(),
            key: key.to_string(),
            value,
            value_hash: "h".to_string(),
            is_error: false,
            meta: None,
            client_ts: None,
            server_ts: "2024-01-01T00:00:00.000Z".to_string(),
            source: "backend".to_string(),
        }
    }

    #[test]
    fn test_event_uses_camel_case_fields() {
        let json = serde_json::to_value(event("Cart", "items", json!([1]))).unwrap();
        assert_eq!(json["componentName"], "Cart");
        assert_eq!(json["valueHash"], "h");
        assert_eq!(json["serverTs"], "2024-01-01T00:00:00.000Z");
        assert_eq!(json["isError"], false);
    }

    #[test]
    fn test_event_parses_with_optional_fields_missing() {
        let line = r#"{"componentName":"A","key":"k","valueHash":"x","serverTs":"t","source":"frontend"}"#;
        let parsed: ChangeEvent = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.value, Value::Null);
        assert!(!parsed.is_error);
        assert!(parsed.meta.is_none());
    }

    #[test]
    fn test_ingest_body_omits_server_ts() {
        let e = event("A", "k", json!(1));
        let body = serde_json::to_value(e.ingest_body()).unwrap();
        assert!(body.get("serverTs").is_none());
        assert_eq!(body["valueHash"], "h");
    }

    #[test]
    fn test_group_sorts_components_and_keys() {
        let grouped = LatestComponentStates::group(vec![
            event("Zeta", "b", json!(1)),
            event("Alpha", "z", json!(2)),
            event("Alpha", "a", json!(3)),
        ]);

        let names: Vec<_> = grouped.iter().map(|g| g.component_name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);

        let keys: Vec<_> = grouped[0].states.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "z"]);
        assert_eq!(grouped[0].state("z").unwrap().value, json!(2));
    }
}
