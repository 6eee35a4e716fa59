//! Keyed state container that logs its own transitions

use std::collections::BTreeMap;

use super::{ChangeEmitter, ObserveOptions, SlotId};
use crate::types::{ChangeEvent, StateValue};

/// Receives emitted change events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ChangeEvent);
}

impl<F> EventSink for F
where
    F: Fn(ChangeEvent) + Send + Sync,
{
    fn emit(&self, event: ChangeEvent) {
        self(event)
    }
}

/// State owned by one component, with every transition routed through a
/// [`ChangeEmitter`] and handed to an [`EventSink`].
///
/// The initial values are the baselines, so the first update to a
/// different value is reported. Keys absent from the initial state start
/// out undefined.
pub struct StateLogger<S: EventSink> {
    component_name: String,
    state: BTreeMap<String, StateValue>,
    emitter: ChangeEmitter,
    sink: S,
}

impl<S: EventSink> StateLogger<S> {
    pub const SOURCE: &'static str = "backend";

    pub fn new(
        component_name: impl Into<String>,
        initial: BTreeMap<String, StateValue>,
        sink: S,
    ) -> Self {
        let component_name = component_name.into();
        let mut emitter = ChangeEmitter::new(Self::SOURCE);
        for (key, value) in &initial {
            emitter.observe(&SlotId::new(component_name.clone(), key.clone()), value.clone());
        }

        Self {
            component_name,
            state: initial,
            emitter,
            sink,
        }
    }

    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    /// Set `key` to `next`. Returns `true` if an event was emitted.
    pub fn update(&mut self, key: &str, next: impl Into<StateValue>) -> bool {
        self.update_with(key, next, ObserveOptions::default())
    }

    pub fn update_with(
        &mut self,
        key: &str,
        next: impl Into<StateValue>,
        options: ObserveOptions,
    ) -> bool {
        let next = next.into();
        let slot = SlotId::new(self.component_name.clone(), key);

        if !self.state.contains_key(key) {
            self.emitter.observe(&slot, StateValue::Undefined);
        }

        let event = self.emitter.observe_with(&slot, next.clone(), options);
        self.state.insert(key.to_string(), next);

        match event {
            Some(event) => {
                tracing::debug!(
                    component = %self.component_name,
                    key,
                    "state changed"
                );
                self.sink.emit(event);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.state.get(key)
    }

    /// Current state snapshot
    pub fn state(&self) -> &BTreeMap<String, StateValue> {
        &self.state
    }
}
