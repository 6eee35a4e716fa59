//! Day-partitioned file store
//!
//! Each calendar day (local time) gets its own `<prefix>-<YYYY-MM-DD>.log`
//! file holding one JSON-encoded event per line. Files are only ever opened
//! in append mode and every event is a single write, so concurrent writers,
//! including other processes, interleave whole lines.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};

use super::clock::{Clock, SystemClock};
use super::{LogStore, StoreResult};
use crate::types::{ChangeEvent, LatestComponentStates};
use crate::utils::day_stamp;

/// Upper bound on the read window; larger values are clamped
pub const MAX_READ_DAYS: u32 = 366;

/// Configuration for the FileStore
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Directory holding the partition files
    pub dir: PathBuf,
    /// File name prefix
    pub prefix: String,
    /// Number of most recent days scanned by reads
    pub read_days: u32,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".log-values"),
            prefix: "backend".to_string(),
            read_days: 3,
        }
    }
}

impl FileStoreConfig {
    /// Create config with custom directory
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the read window, clamped to [`MAX_READ_DAYS`]
    pub fn with_read_days(mut self, read_days: u32) -> Self {
        self.read_days = read_days.min(MAX_READ_DAYS);
        self
    }

    /// Get path to the partition for `day`
    pub fn partition_path(&self, day: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}-{}.log", self.prefix, day_stamp(day)))
    }
}

/// Append-only, day-partitioned event log
#[derive(Clone)]
pub struct FileStore {
    config: Arc<FileStoreConfig>,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    /// Create a store on the system clock
    pub fn new(config: FileStoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a store with a custom calendar source
    pub fn with_clock(config: FileStoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            clock,
        }
    }

    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    /// Partition that writes go to right now
    pub fn current_partition(&self) -> PathBuf {
        self.config.partition_path(self.clock.today())
    }
}

#[async_trait]
impl LogStore for FileStore {
    async fn init(&self) -> StoreResult<()> {
        let config = self.config.clone();
        let today = self.clock.today();
        tokio::task::spawn_blocking(move || init_partition(&config, today)).await?
    }

    async fn insert(&self, event: &ChangeEvent) -> StoreResult<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let config = self.config.clone();
        let today = self.clock.today();
        tokio::task::spawn_blocking(move || append_line(&config, today, &line)).await?
    }

    async fn latest_by_component(&self) -> StoreResult<Vec<LatestComponentStates>> {
        let config = self.config.clone();
        let today = self.clock.today();
        tokio::task::spawn_blocking(move || scan_latest(&config, today)).await?
    }
}

fn open_partition(config: &FileStoreConfig, day: NaiveDate) -> StoreResult<fs::File> {
    fs::create_dir_all(&config.dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.partition_path(day))?;
    Ok(file)
}

fn init_partition(config: &FileStoreConfig, today: NaiveDate) -> StoreResult<()> {
    open_partition(config, today)?;
    Ok(())
}

fn append_line(config: &FileStoreConfig, today: NaiveDate, line: &[u8]) -> StoreResult<()> {
    let mut file = open_partition(config, today)?;
    // One write per event keeps lines whole under O_APPEND.
    file.write_all(line)?;
    Ok(())
}

/// Scan the last `read_days` partitions, oldest first.
///
/// The event with the greatest `serverTs` wins per (component, key); on
/// equal timestamps the one read later wins.
fn scan_latest(config: &FileStoreConfig, today: NaiveDate) -> StoreResult<Vec<LatestComponentStates>> {
    let mut latest: HashMap<(String, String), ChangeEvent> = HashMap::new();

    // Oldest first; days before the calendar's start simply don't exist.
    let read_days = config.read_days.min(MAX_READ_DAYS);
    for offset in (0..read_days).rev() {
        let Some(day) = today.checked_sub_days(Days::new(offset as u64)) else {
            continue;
        };
        let path = config.partition_path(day);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        for (line_num, line) in content.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let event: ChangeEvent = match serde_json::from_slice(line) {
                Ok(event) => event,
                Err(e) => {
                    tracing::debug!(
                        path = %path.display(),
                        line = line_num + 1,
                        error = %e,
                        "skipping unreadable log line"
                    );
                    continue;
                }
            };

            match latest.entry((event.component_name.clone(), event.key.clone())) {
                Entry::Occupied(mut current) => {
                    if current.get().server_ts <= event.server_ts {
                        current.insert(event);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(event);
                }
            }
        }
    }

    Ok(LatestComponentStates::group(latest.into_values()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::ManualClock;
    use serde_json::json;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn event(component: &str, key: &str, value: serde_json::Value, server_ts: &str) -> ChangeEvent {
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

    fn store_at(dir: &Path, today: NaiveDate, read_days: u32) -> (FileStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(today));
        let config = FileStoreConfig::new(dir).with_read_days(read_days);
        (FileStore::with_clock(config, clock.clone()), clock)
    }

    #[test]
    fn test_partition_path() {
        let config = FileStoreConfig::new("/tmp/logs").with_prefix("svc");
        assert_eq!(
            config.partition_path(day(7)),
            PathBuf::from("/tmp/logs/svc-2024-05-07.log")
        );
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(&dir.path().join("nested"), day(1), 3);

        store.init().await.unwrap();
        store.init().await.unwrap();

        let partition = store.current_partition();
        assert!(partition.ends_with("backend-2024-05-01.log"));
        assert_eq!(fs::read(partition).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_insert_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), day(1), 3);

        store.insert(&event("A", "k", json!(1), "2024-05-01T00:00:00.000Z")).await.unwrap();
        store.insert(&event("A", "k", json!(2), "2024-05-01T00:00:01.000Z")).await.unwrap();

        let content = fs::read_to_string(store.current_partition()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(content.ends_with('\n'));
        let parsed: ChangeEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.value, json!(2));
    }

    #[tokio::test]
    async fn test_equal_server_ts_later_line_wins() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), day(1), 1);

        let ts = "2024-05-01T12:00:00.000Z";
        store.insert(&event("A", "k", json!("first"), ts)).await.unwrap();
        store.insert(&event("A", "k", json!("second"), ts)).await.unwrap();

        let latest = store.latest_by_component().await.unwrap();
        assert_eq!(latest[0].states[0].value, json!("second"));
    }

    #[tokio::test]
    async fn test_older_server_ts_does_not_replace_newer() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), day(1), 1);

        store.insert(&event("A", "k", json!("new"), "2024-05-01T12:00:00.000Z")).await.unwrap();
        store.insert(&event("A", "k", json!("old"), "2024-05-01T11:00:00.000Z")).await.unwrap();

        let latest = store.latest_by_component().await.unwrap();
        assert_eq!(latest[0].states[0].value, json!("new"));
    }

    #[tokio::test]
    async fn test_read_window_excludes_old_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clock) = store_at(dir.path(), day(1), 2);

        store.insert(&event("A", "k", json!(1), "2024-05-01T00:00:00.000Z")).await.unwrap();

        clock.set(day(2));
        assert_eq!(store.latest_by_component().await.unwrap().len(), 1);

        clock.set(day(3));
        assert!(store.latest_by_component().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_huge_read_window_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FileStoreConfig::new(dir.path()).with_read_days(u32::MAX).read_days, MAX_READ_DAYS);

        // Set directly, bypassing the builder.
        let config = FileStoreConfig {
            read_days: u32::MAX,
            ..FileStoreConfig::new(dir.path())
        };
        let store = FileStore::with_clock(config, Arc::new(ManualClock::new(day(1))));
        store.insert(&event("A", "k", json!(1), "2024-05-01T00:00:00.000Z")).await.unwrap();

        let latest = store.latest_by_component().await.unwrap();
        assert_eq!(latest.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_read_days_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), day(1), 0);

        store.insert(&event("A", "k", json!(1), "2024-05-01T00:00:00.000Z")).await.unwrap();
        assert!(store.latest_by_component().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), day(1), 1);

        store.insert(&event("A", "k", json!(1), "2024-05-01T00:00:00.000Z")).await.unwrap();
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(store.current_partition())
                .unwrap();
            file.write_all(&[0xff, 0xfe, b'{', b'\n']).unwrap();
        }
        store.insert(&event("B", "k", json!(2), "2024-05-01T00:00:01.000Z")).await.unwrap();

        let latest = store.latest_by_component().await.unwrap();
        assert_eq!(latest.len(), 2);
    }

    #[tokio::test]
    async fn test_unwritable_directory_fails_insert() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let (store, _) = store_at(&blocker, day(1), 1);
        assert!(store.init().await.is_err());
        assert!(store
            .insert(&event("A", "k", json!(1), "2024-05-01T00:00:00.000Z"))
            .await
            .is_err());
    }
}
