//! Value fingerprinting
//!
//! A fingerprint is a canonical JSON rendering of a value. Two values that
//! are deeply equal after normalization always produce the same string:
//!
//! - object keys are sorted, so member order never matters
//! - array order is kept
//! - dates become `{"$date": "<ISO-8601>"}`
//! - undefined object members are dropped, and a bare undefined value has
//!   its own marker so it never collides with `null`
//! - a node revisited on its own recursion path becomes `"[Circular]"`
//!
//! Fingerprints are for equality and dedup only. They are not hashes in the
//! cryptographic sense and are never decoded back into values.
//!
//! Every function here is total: failures fall back to [`UNSTRINGIFIABLE`].

mod normalize;

use serde::Serialize;
use serde_json::Value;

use crate::types::StateValue;
use normalize::{Mode, NormalizeError, Normalizer};

pub use normalize::CIRCULAR_MARKER;

/// Fingerprint of any value that cannot be rendered
pub const UNSTRINGIFIABLE: &str = r#"{"$unstringifiable":true}"#;

/// Fingerprint of a bare undefined value
pub const UNDEFINED: &str = r#"{"$undefined":true}"#;

/// Fingerprint a tracked value
pub fn fingerprint(value: &StateValue) -> String {
    if value.is_undefined() {
        return UNDEFINED.to_string();
    }
    match try_fingerprint(value) {
        Ok(text) => text,
        Err(e) => {
            tracing::trace!(error = %e, "value fell back to unstringifiable fingerprint");
            UNSTRINGIFIABLE.to_string()
        }
    }
}

fn try_fingerprint(value: &StateValue) -> Result<String, NormalizeError> {
    let normalized = Normalizer::new(Mode::Fingerprint).normalize(value)?;
    Ok(serde_json::to_string(&normalized)?)
}

/// Fingerprint a plain JSON value
pub fn fingerprint_json(value: &Value) -> String {
    fingerprint(&StateValue::from(value))
}

/// Fingerprint anything serde can serialize.
///
/// Goes through `serde_json::to_value`, so types serialize the way their
/// `Serialize` impl says (a `chrono::DateTime` becomes a plain string, not a
/// tagged date). Serialization failures yield [`UNSTRINGIFIABLE`].
pub fn fingerprint_serializable<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(json) => fingerprint_json(&json),
        Err(e) => {
            tracing::trace!(error = %e, "serialization failed while fingerprinting");
            UNSTRINGIFIABLE.to_string()
        }
    }
}

/// JSON form of a tracked value as shipped in a change event.
///
/// Dates render as ISO strings, cycles as `"[Circular]"` and opaque values
/// as `null`.
pub fn to_payload(value: &StateValue) -> Value {
    Normalizer::new(Mode::Payload)
        .normalize(value)
        .unwrap_or(Value::Null)
}
