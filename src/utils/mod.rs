//! Utility functions and helpers
//!
//! This module contains timestamp utilities shared by the emitter, the
//! stores and the HTTP API.

pub mod time;

pub use time::{day_stamp, format_iso, now_iso, parse_client_timestamp, ServerTimestamps};
