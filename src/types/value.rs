//! Tracked value model
//!
//! `StateValue` is what producers hand to the change emitter. Arrays and
//! objects are shared nodes, so a value may alias parts of itself or even
//! contain itself, the same way an application object graph can.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;

/// Shared array node
pub type SharedArray = Arc<RwLock<Vec<StateValue>>>;

/// Shared object node, entries kept in insertion order
pub type SharedObject = Arc<RwLock<Vec<(String, StateValue)>>>;

/// A value observed by the change emitter
///
/// Nodes are reference counted, so a node that contains itself (directly or
/// through other nodes) is never freed. Fingerprinting handles such cycles,
/// but callers that build them should break the cycle once the value is no
/// longer needed, e.g. by overwriting the back-reference with [`StateValue::set`].
#[derive(Clone, Default)]
pub enum StateValue {
    /// Absent value. Dropped from objects, `null` everywhere else.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Date-like value, fingerprinted as `{"$date": <ISO-8601>}`
    Date(DateTime<Utc>),
    Array(SharedArray),
    Object(SharedObject),
    /// A value with no JSON representation (handles, closures, ...).
    /// Carries a type name for diagnostics only.
    Opaque(&'static str),
}

impl StateValue {
    /// Build an array node
    pub fn array(items: impl IntoIterator<Item = StateValue>) -> Self {
        StateValue::Array(Arc::new(RwLock::new(items.into_iter().collect())))
    }

    /// Build an object node. Later duplicates of a key replace earlier ones.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, StateValue)>) -> Self {
        let value = StateValue::Object(Arc::new(RwLock::new(Vec::new())));
        for (key, entry) in entries {
            value.set(key, entry);
        }
        value
    }

    /// Set a member on an object node in place.
    ///
    /// Returns `false` if `self` is not an object.
    pub fn set(&self, key: impl Into<String>, value: StateValue) -> bool {
        let StateValue::Object(node) = self else {
            return false;
        };
        let key = key.into();
        let mut entries = node.write();
        match entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => entries.push((key, value)),
        }
        true
    }

    /// Append to an array node in place.
    ///
    /// Returns `false` if `self` is not an array.
    pub fn push(&self, value: StateValue) -> bool {
        let StateValue::Array(node) = self else {
            return false;
        };
        node.write().push(value);
        true
    }

    /// Look up an object member (cloned handle)
    pub fn get(&self, key: &str) -> Option<StateValue> {
        let StateValue::Object(node) = self else {
            return None;
        };
        let entries = node.read();
        entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone())
    }

    /// Identity-or-primitive equality.
    ///
    /// Shared nodes compare by pointer, scalars by value. `NaN` is the same
    /// as `NaN`, and `0.0` is not the same as `-0.0`.
    pub fn is_same(&self, other: &StateValue) -> bool {
        match (self, other) {
            (StateValue::Undefined, StateValue::Undefined) => true,
            (StateValue::Null, StateValue::Null) => true,
            (StateValue::Bool(a), StateValue::Bool(b)) => a == b,
            (StateValue::Number(a), StateValue::Number(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (StateValue::String(a), StateValue::String(b)) => a == b,
            (StateValue::Date(a), StateValue::Date(b)) => a == b,
            (StateValue::Array(a), StateValue::Array(b)) => Arc::ptr_eq(a, b),
            (StateValue::Object(a), StateValue::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, StateValue::Undefined)
    }
}

// Nodes may be cyclic, so never descend into them here.
impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Undefined => write!(f, "Undefined"),
            StateValue::Null => write!(f, "Null"),
            StateValue::Bool(b) => write!(f, "Bool({})", b),
            StateValue::Number(n) => write!(f, "Number({})", n),
            StateValue::String(s) => write!(f, "String({:?})", s),
            StateValue::Date(d) => write!(f, "Date({})", d.to_rfc3339()),
            StateValue::Array(node) => {
                write!(f, "Array({:p}, len={})", Arc::as_ptr(node), node.read().len())
            }
            StateValue::Object(node) => {
                write!(f, "Object({:p}, len={})", Arc::as_ptr(node), node.read().len())
            }
            StateValue::Opaque(name) => write!(f, "Opaque({})", name),
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        StateValue::Number(value)
    }
}

impl From<i32> for StateValue {
    fn from(value: i32) -> Self {
        StateValue::Number(value as f64)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Number(value as f64)
    }
}

impl From<u64> for StateValue {
    fn from(value: u64) -> Self {
        StateValue::Number(value as f64)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::String(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::String(value)
    }
}

impl From<DateTime<Utc>> for StateValue {
    fn from(value: DateTime<Utc>) -> Self {
        StateValue::Date(value)
    }
}

impl<T: Into<StateValue>> From<Option<T>> for StateValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(StateValue::Null)
    }
}

impl From<Value> for StateValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => StateValue::Null,
            Value::Bool(b) => StateValue::Bool(b),
            Value::Number(n) => StateValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => StateValue::String(s),
            Value::Array(items) => StateValue::array(items.into_iter().map(StateValue::from)),
            Value::Object(map) => {
                StateValue::object(map.into_iter().map(|(k, v)| (k, StateValue::from(v))))
            }
        }
    }
}

impl From<&Value> for StateValue {
    fn from(value: &Value) -> Self {
        StateValue::from(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_replaces_existing_member() {
        let obj = StateValue::object([("a", StateValue::from(1))]);
        assert!(obj.set("a", StateValue::from(2)));
        assert!(obj.set("b", StateValue::from(3)));

        assert!(matches!(obj.get("a"), Some(StateValue::Number(n)) if n == 2.0));
        assert!(matches!(obj.get("b"), Some(StateValue::Number(n)) if n == 3.0));
        assert!(!StateValue::from(1).set("a", StateValue::Null));
    }

    #[test]
    fn test_overwriting_back_reference_releases_cycle() {
        let obj = StateValue::object([("a", StateValue::from(1))]);
        obj.set("me", obj.clone());
        let StateValue::Object(node) = &obj else {
            panic!("expected an object");
        };
        assert_eq!(Arc::strong_count(node), 2);

        obj.set("me", StateValue::Null);
        assert_eq!(Arc::strong_count(node), 1);
    }

    #[test]
    fn test_is_same_uses_node_identity() {
        let a = StateValue::from(json!({"x": 1}));
        let b = StateValue::from(json!({"x": 1}));
        let alias = a.clone();

        assert!(a.is_same(&alias));
        assert!(!a.is_same(&b));
        assert!(StateValue::from(f64::NAN).is_same(&StateValue::from(f64::NAN)));
        assert!(!StateValue::from(0.0).is_same(&StateValue::from(-0.0)));
        assert!(StateValue::from("x").is_same(&StateValue::from("x")));
    }

    #[test]
    fn test_debug_does_not_follow_cycles() {
        let obj = StateValue::object(Vec::<(String, StateValue)>::new());
        obj.set("self", obj.clone());
        let rendered = format!("{:?}", obj);
        assert!(rendered.starts_with("Object("));
    }
}
