//! Event Store Module
//!
//! Persistence for change events behind one capability trait:
//! - `FileStore`: day-partitioned JSON-lines files (reference implementation)
//! - `SqliteStore`: relational variant, latest-per-key computed in SQL
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌──────────────┐    ┌───────────────────────────┐
//! │ POST /ingest │───►│ append one line to        │
//! │              │    │ <prefix>-<YYYY-MM-DD>.log │
//! └──────────────┘    └───────────────────────────┘
//!
//! Read Path:
//! ┌──────────────┐    ┌──────────────────────┐    ┌──────────────────┐
//! │ GET /states  │───►│ scan last N days     │───►│ max serverTs per │───► grouped,
//! │              │    │ skip corrupt lines   │    │ (component, key) │     sorted
//! └──────────────┘    └──────────────────────┘    └──────────────────┘
//! ```

mod clock;
mod file;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::types::{ChangeEvent, LatestComponentStates};

pub use clock::{Clock, ManualClock, SystemClock};
pub use file::{FileStore, FileStoreConfig, MAX_READ_DAYS};
pub use sqlite::SqliteStore;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only change event log with a latest-state projection
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Prepare storage. Idempotent.
    async fn init(&self) -> StoreResult<()>;

    /// Append one event
    async fn insert(&self, event: &ChangeEvent) -> StoreResult<()>;

    /// Latest event per (component, key), grouped by component.
    ///
    /// Components are sorted ascending. Recomputed on every call.
    async fn latest_by_component(&self) -> StoreResult<Vec<LatestComponentStates>>;
}

/// Open and initialize the store selected by `config`.
///
/// A database URL selects [`SqliteStore`]; otherwise the file store is used.
pub async fn open_store(config: &ServerConfig) -> StoreResult<Arc<dyn LogStore>> {
    let store: Arc<dyn LogStore> = match &config.database_url {
        Some(url) => {
            let path = sqlite::path_from_url(url);
            tracing::info!(path = %path, "using relational state log store");
            Arc::new(SqliteStore::open(path)?)
        }
        None => {
            let file_config = config.file_store_config();
            tracing::info!(
                dir = %file_config.dir.display(),
                read_days = file_config.read_days,
                "using file state log store"
            );
            Arc::new(FileStore::new(file_config))
        }
    };
    store.init().await?;
    Ok(store)
}
