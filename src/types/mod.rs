//! Data types for state logging
//!
//! This module contains the core data structures shared by the emitter,
//! the transport, the stores and the HTTP API.

mod event;
mod value;

pub use event::{ChangeEvent, ComponentState, IngestBody, LatestComponentStates};
pub use value::{SharedArray, SharedObject, StateValue};

/// Result type for top-level operations (binary entry point, server startup)
pub type AppResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Placeholder owner for ingest payloads that omit `componentName`
pub const UNKNOWN_COMPONENT: &str = "UnknownComponent";

/// Default slot name for ingest payloads that omit `key`
pub const DEFAULT_KEY: &str = "state";

/// Default origin tag for ingest payloads that omit `source`
pub const DEFAULT_SOURCE: &str = "frontend";
