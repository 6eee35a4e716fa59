//! API module for the ingest server
//!
//! REST endpoints for producers and readers, plus the alert hook fired for
//! stored error events.

pub mod alert;
pub mod http;
pub mod rest;
pub mod state;

pub use alert::{format_alert, AlertError, AlertSink, TelegramConfig, TelegramSink};
pub use http::{create_router, serve};
pub use state::AppState;
