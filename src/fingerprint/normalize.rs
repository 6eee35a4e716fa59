//! Recursive value normalization with a cycle guard

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Map, Number, Value};
use thiserror::Error;

use crate::types::StateValue;
use crate::utils::format_iso;

/// Substituted for a node that is revisited while still being normalized
pub const CIRCULAR_MARKER: &str = "[Circular]";

/// What the normalized form is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Stable form for equality: dates tagged, opaque values rejected
    Fingerprint,
    /// Lossy form shipped as an event's `value`: dates as strings, opaque
    /// values as `null`
    Payload,
}

#[derive(Debug, Error)]
pub(crate) enum NormalizeError {
    #[error("value of type {0} has no JSON representation")]
    Unrepresentable(&'static str),

    #[error("encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

pub(crate) struct Normalizer {
    mode: Mode,
    /// Nodes on the active recursion path
    path: HashSet<usize>,
}

impl Normalizer {
    pub(crate) fn new(mode: Mode) -> Self {
        Self {
            mode,
            path: HashSet::new(),
        }
    }

    pub(crate) fn normalize(&mut self, value: &StateValue) -> Result<Value, NormalizeError> {
        match value {
            StateValue::Undefined | StateValue::Null => Ok(Value::Null),
            StateValue::Bool(b) => Ok(Value::Bool(*b)),
            StateValue::Number(n) => Ok(number(*n)),
            StateValue::String(s) => Ok(Value::String(s.clone())),
            StateValue::Date(ts) => {
                let iso = format_iso(ts);
                Ok(match self.mode {
                    Mode::Fingerprint => json!({ "$date": iso }),
                    Mode::Payload => Value::String(iso),
                })
            }
            StateValue::Opaque(type_name) => match self.mode {
                Mode::Fingerprint => Err(NormalizeError::Unrepresentable(type_name)),
                Mode::Payload => Ok(Value::Null),
            },
            StateValue::Array(node) => {
                self.enter(node_addr(node), |this| {
                    // Snapshot so no lock is held while recursing.
                    let items = node.read().clone();
                    items
                        .iter()
                        .map(|item| this.normalize(item))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::Array)
                })
            }
            StateValue::Object(node) => {
                self.enter(node_addr(node), |this| {
                    let mut entries = node.read().clone();
                    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

                    let mut map = Map::new();
                    for (key, member) in &entries {
                        if member.is_undefined() {
                            continue;
                        }
                        map.insert(key.clone(), this.normalize(member)?);
                    }
                    Ok(Value::Object(map))
                })
            }
        }
    }

    fn enter<F>(&mut self, addr: usize, f: F) -> Result<Value, NormalizeError>
    where
        F: FnOnce(&mut Self) -> Result<Value, NormalizeError>,
    {
        if !self.path.insert(addr) {
            return Ok(Value::String(CIRCULAR_MARKER.to_string()));
        }
        let result = f(self);
        self.path.remove(&addr);
        result
    }
}

fn node_addr<T>(node: &Arc<T>) -> usize {
    Arc::as_ptr(node) as *const () as usize
}

/// Integral values render without a fractional part; non-finite values
/// become `null`.
fn number(n: f64) -> Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}
