//! SQLite implementation of the LogStore trait.
//!
//! The relational variant keeps every event in one table and lets the
//! engine pick the latest row per (component, key). Uses rusqlite with
//! bundled SQLite, wrapped in async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};

use super::{LogStore, StoreResult};
use crate::types::{ChangeEvent, LatestComponentStates};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS state_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        component_name TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        value_hash TEXT NOT NULL,
        is_error INTEGER NOT NULL DEFAULT 0,
        meta TEXT,
        client_ts TEXT,
        server_ts TEXT NOT NULL,
        source TEXT NOT NULL DEFAULT 'frontend'
    );
    CREATE INDEX IF NOT EXISTS idx_state_logs_component_key_ts
        ON state_logs (component_name, key, server_ts DESC);
";

const LATEST_QUERY: &str = "
    SELECT component_name, key, value, value_hash, is_error, meta, client_ts, server_ts, source
    FROM (
        SELECT *, ROW_NUMBER() OVER (
            PARTITION BY component_name, key
            ORDER BY server_ts DESC, id DESC
        ) AS rn
        FROM state_logs
    )
    WHERE rn = 1
    ORDER BY component_name, key
";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file if it doesn't exist; the schema is created by
    /// [`LogStore::init`].
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl LogStore for SqliteStore {
    async fn init(&self) -> StoreResult<()> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            conn.lock().execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?
    }

    async fn insert(&self, event: &ChangeEvent) -> StoreResult<()> {
        let value = serde_json::to_string(&event.value)?;
        let meta = event.meta.as_ref().map(serde_json::to_string).transpose()?;
        let event = event.clone();
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            conn.lock().execute(
                "INSERT INTO state_logs (
                    component_name, key, value, value_hash, is_error,
                    meta, client_ts, server_ts, source
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    event.component_name,
                    event.key,
                    value,
                    event.value_hash,
                    event.is_error,
                    meta,
                    event.client_ts,
                    event.server_ts,
                    event.source,
                ],
            )?;
            Ok(())
        })
        .await?
    }

    async fn latest_by_component(&self) -> StoreResult<Vec<LatestComponentStates>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let mut stmt = conn.prepare(LATEST_QUERY)?;
            let rows = stmt.query_map([], |row| {
                Ok(RawRow {
                    component_name: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                    value_hash: row.get(3)?,
                    is_error: row.get(4)?,
                    meta: row.get(5)?,
                    client_ts: row.get(6)?,
                    server_ts: row.get(7)?,
                    source: row.get(8)?,
                })
            })?;

            let mut events = Vec::new();
            for row in rows {
                match row?.into_event() {
                    Ok(event) => events.push(event),
                    Err(e) => tracing::debug!(error = %e, "skipping unreadable state_logs row"),
                }
            }
            Ok(LatestComponentStates::group(events))
        })
        .await?
    }
}

struct RawRow {
    component_name: String,
    key: String,
    value: String,
    value_hash: String,
    is_error: bool,
    meta: Option<String>,
    client_ts: Option<String>,
    server_ts: String,
    source: String,
}

impl RawRow {
    fn into_event(self) -> Result<ChangeEvent, serde_json::Error> {
        let value: Value = serde_json::from_str(&self.value)?;
        let meta = self
            .meta
            .as_deref()
            .map(serde_json::from_str::<Map<String, Value>>)
            .transpose()?;

        Ok(ChangeEvent {
            component_name: self.component_name,
            key: self.key,
            value,
            value_hash: self.value_hash,
            is_error: self.is_error,
            meta,
            client_ts: self.client_ts,
            server_ts: self.server_ts,
            source: self.source,
        })
    }
}

/// Filesystem path from a database URL (`sqlite://path`, `sqlite:path` or a
/// bare path)
pub(crate) fn path_from_url(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(component: &str, key: &str, value: Value, server_ts: &str) -> ChangeEvent {
        ChangeEvent {
            component_name: component.to_string(),
            key: key.to_string(),
            value_hash: value.to_string(),
            value,
            is_error: false,
            meta: None,
            client_ts: None,
            server_ts: server_ts.to_string(),
            source: "frontend".to_string(),
        }
    }

    async fn memory_store() -> SqliteStore {
        let store = SqliteStore::open_memory().unwrap();
        store.init().await.unwrap();
        store
    }

    #[test]
    fn test_path_from_url() {
        assert_eq!(path_from_url("sqlite:///var/db/x.db"), "/var/db/x.db");
        assert_eq!(path_from_url("sqlite:x.db"), "x.db");
        assert_eq!(path_from_url("states.db"), "states.db");
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let store = memory_store().await;
        store.init().await.unwrap();
    }

    #[tokio::test]
    async fn test_latest_per_key() {
        let store = memory_store().await;
        store.insert(&event("Cart", "items", json!([1]), "2024-01-01T00:00:00.000Z")).await.unwrap();
        store.insert(&event("Cart", "items", json!([1, 2]), "2024-01-01T00:00:02.000Z")).await.unwrap();
        store.insert(&event("Cart", "total", json!(5), "2024-01-01T00:00:01.000Z")).await.unwrap();
        store.insert(&event("Auth", "user", json!(null), "2024-01-01T00:00:00.000Z")).await.unwrap();

        let latest = store.latest_by_component().await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].component_name, "Auth");
        assert_eq!(latest[0].states[0].value, Value::Null);

        let cart = &latest[1];
        assert_eq!(cart.states.len(), 2);
        assert_eq!(cart.state("items").unwrap().value, json!([1, 2]));
        assert_eq!(cart.state("total").unwrap().value, json!(5));
    }

    #[tokio::test]
    async fn test_equal_server_ts_later_insert_wins() {
        let store = memory_store().await;
        let ts = "2024-01-01T00:00:00.000Z";
        store.insert(&event("A", "k", json!("first"), ts)).await.unwrap();
        store.insert(&event("A", "k", json!("second"), ts)).await.unwrap();

        let latest = store.latest_by_component().await.unwrap();
        assert_eq!(latest[0].states[0].value, json!("second"));
    }

    #[tokio::test]
    async fn test_meta_round_trips() {
        let store = memory_store().await;
        let mut e = event("A", "k", json!(1), "2024-01-01T00:00:00.000Z");
        let mut meta = Map::new();
        meta.insert("prev".to_string(), json!(0));
        e.meta = Some(meta.clone());
        e.is_error = true;
        store.insert(&e).await.unwrap();

        let latest = store.latest_by_component().await.unwrap();
        let state = &latest[0].states[0];
        assert!(state.is_error);
        assert_eq!(state.meta.as_ref(), Some(&meta));
    }
}
