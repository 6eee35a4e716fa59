//! Validation of untrusted ingest bodies
//!
//! This module turns loosely typed producer payloads into well-formed
//! change events.

mod ingest;

pub use ingest::{coerce_string, is_truthy, validate_ingest, InvalidReason, Validation};
