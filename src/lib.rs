//! State Log
//!
//! Records named-value changes ("state transitions") as they happen and
//! ships them to a durable, append-only log that can be queried for the most
//! recent value of each tracked key per component.
//!
//! # Features
//!
//! - **Change detection**: structural fingerprints, cycle-safe, so
//!   re-assigning an equal value never produces an event
//! - **Best-effort transport**: fire-and-forget delivery to a local offline
//!   server or a remote URL
//! - **Day-partitioned log**: one JSON line per event, latest-per-key reads
//!   over a sliding window of days
//! - **Relational variant**: the same store contract on SQLite
//!
//! # Modules
//!
//! - `types`: Core data structures (StateValue, ChangeEvent, LatestComponentStates)
//! - `fingerprint`: Deterministic value fingerprints
//! - `emitter`: Change detection and the keyed StateLogger
//! - `transport`: Endpoint resolution and event delivery
//! - `event_store`: LogStore trait with file and SQLite backends
//! - `validation`: Ingest body validation
//! - `api`: HTTP ingest server and alert hook
//! - `config`: Server configuration
//! - `utils`: Utility functions (timestamps, etc.)
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use state_log::{Destination, IngestTransport, StateLogger, StateValue, TransportConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = IngestTransport::new(&TransportConfig::from_env(Destination::Offline));
//!     let mut logger = StateLogger::new("Worker", BTreeMap::new(), transport);
//!     logger.update("status", StateValue::from("idle"));
//!     logger.update("status", StateValue::from("busy"));
//! }
//! ```

pub mod api;
pub mod config;
pub mod emitter;
pub mod event_store;
pub mod fingerprint;
pub mod transport;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used items at crate root
pub use config::ServerConfig;
pub use emitter::{ChangeEmitter, EventSink, ObserveOptions, SharedEmitter, SlotId, StateLogger};
pub use event_store::{open_store, FileStore, FileStoreConfig, LogStore, SqliteStore, StoreError};
pub use fingerprint::fingerprint;
pub use transport::{Destination, IngestTransport, RuntimeMode, TransportConfig};
pub use types::{ChangeEvent, ComponentState, LatestComponentStates, StateValue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
