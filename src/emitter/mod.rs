//! Change detection
//!
//! The emitter keeps one [`TrackedSlot`] per (component, key) and decides,
//! for every observed write, whether it is worth an event:
//!
//! 1. first observation of a slot: record the baseline, no event
//! 2. same node or equal primitive: no event, no fingerprint computed
//! 3. fingerprint equal to the slot's last one: no event, baseline updated
//! 4. otherwise: emit and move the baseline
//!
//! Emission is synchronous and never fails; delivery is somebody else's job
//! (see [`crate::transport`]).

mod logger;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::fingerprint::{fingerprint, to_payload};
use crate::types::{ChangeEvent, StateValue, DEFAULT_KEY, DEFAULT_SOURCE, UNKNOWN_COMPONENT};
use crate::utils::now_iso;

pub use logger::{EventSink, StateLogger};

/// Identifies one tracked slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    pub component_name: String,
    pub key: String,
}

impl SlotId {
    /// Empty names fall back to `UnknownComponent` and `state`
    pub fn new(component_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            component_name: non_empty(component_name.into(), UNKNOWN_COMPONENT),
            key: non_empty(key.into(), DEFAULT_KEY),
        }
    }
}

fn non_empty(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

/// In-memory baseline for one slot
#[derive(Debug, Clone)]
pub struct TrackedSlot {
    previous_value: StateValue,
    /// Fingerprint of the baseline or of the last emitted value
    previous_hash: String,
}

impl TrackedSlot {
    pub fn previous_value(&self) -> &StateValue {
        &self.previous_value
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }
}

/// Extra fields for a single observation
#[derive(Debug, Clone, Default)]
pub struct ObserveOptions {
    pub is_error: bool,
    pub meta: Option<Map<String, Value>>,
}

impl ObserveOptions {
    pub fn error() -> Self {
        Self {
            is_error: true,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Decides which observed writes become change events
#[derive(Debug)]
pub struct ChangeEmitter {
    source: String,
    slots: HashMap<SlotId, TrackedSlot>,
}

impl ChangeEmitter {
    /// Create an emitter that tags its events with `source` (`frontend`
    /// when empty)
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: non_empty(source.into(), DEFAULT_SOURCE),
            slots: HashMap::new(),
        }
    }

    /// Origin tag used for emitted events
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of slots observed so far
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Current baseline for a slot
    pub fn slot(&self, slot: &SlotId) -> Option<&TrackedSlot> {
        self.slots.get(slot)
    }

    /// Observe a write with default options
    pub fn observe(&mut self, slot: &SlotId, value: StateValue) -> Option<ChangeEvent> {
        self.observe_with(slot, value, ObserveOptions::default())
    }

    /// Observe a write; returns the event to emit, if any
    pub fn observe_with(
        &mut self,
        slot: &SlotId,
        value: StateValue,
        options: ObserveOptions,
    ) -> Option<ChangeEvent> {
        if !self.slots.contains_key(slot) {
            let previous_hash = fingerprint(&value);
            self.slots.insert(
                slot.clone(),
                TrackedSlot {
                    previous_value: value,
                    previous_hash,
                },
            );
            return None;
        }

        let tracked = self.slots.get_mut(slot)?;

        if tracked.previous_value.is_same(&value) {
            return None;
        }

        let hash = fingerprint(&value);
        if hash == tracked.previous_hash {
            tracked.previous_value = value;
            return None;
        }

        let payload = to_payload(&value);
        let previous = std::mem::replace(&mut tracked.previous_value, value);
        tracked.previous_hash = hash.clone();

        let mut meta = Map::new();
        meta.insert("prev".to_string(), to_payload(&previous));
        if let Some(extra) = options.meta {
            for (key, entry) in extra {
                if key != "prev" {
                    meta.insert(key, entry);
                }
            }
        }

        let now = now_iso();
        Some(ChangeEvent {
            component_name: non_empty(slot.component_name.clone(), UNKNOWN_COMPONENT),
            key: non_empty(slot.key.clone(), DEFAULT_KEY),
            value: payload,
            value_hash: hash,
            is_error: options.is_error,
            meta: Some(meta),
            client_ts: Some(now.clone()),
            // Provisional; the ingest server assigns the authoritative one.
            server_ts: now,
            source: self.source.clone(),
        })
    }
}

/// A [`ChangeEmitter`] shared between producers.
///
/// Concurrent observations of one slot are last-write-wins on the baseline.
#[derive(Debug, Clone)]
pub struct SharedEmitter {
    inner: Arc<Mutex<ChangeEmitter>>,
}

impl SharedEmitter {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChangeEmitter::new(source))),
        }
    }

    pub fn observe(&self, slot: &SlotId, value: StateValue) -> Option<ChangeEvent> {
        self.inner.lock().observe(slot, value)
    }

    pub fn observe_with(
        &self,
        slot: &SlotId,
        value: StateValue,
        options: ObserveOptions,
    ) -> Option<ChangeEvent> {
        self.inner.lock().observe_with(slot, value, options)
    }
}
