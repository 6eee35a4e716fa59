//! Server configuration
//!
//! Everything the ingest server needs is read once at startup. Malformed
//! values never abort startup; they fall back to the default with a warning.

use std::env;
use std::path::{Path, PathBuf};

use crate::api::alert::TelegramConfig;
use crate::event_store::{FileStoreConfig, MAX_READ_DAYS};
use crate::transport::DEFAULT_PORT;

/// Default number of day partitions scanned by `GET /states`
pub const DEFAULT_READ_DAYS: u32 = 3;

/// Default directory for day partitions, relative to the working directory
pub const DEFAULT_LOG_DIR: &str = ".log-values";

/// Partition file prefix used by the server
pub const SERVER_LOG_PREFIX: &str = "backend";

/// Ingest server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port (`STATE_LOG_SERVER_PORT`)
    pub port: u16,
    /// Days scanned by reads (`STATE_LOG_READ_DAYS`)
    pub read_days: u32,
    /// Partition directory (`STATE_LOG_DIR`)
    pub log_dir: PathBuf,
    /// Relational store location (`DATABASE_URL`); selects the SQLite backend
    pub database_url: Option<String>,
    /// Chat alerts for error events (`TELEGRAM_BOT_TOKEN`, `TELEGRAM_GROUP_ID`,
    /// `TELEGRAM_TOPIC_ID`)
    pub telegram: Option<TelegramConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            read_days: DEFAULT_READ_DAYS,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            database_url: None,
            telegram: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let port = var("STATE_LOG_SERVER_PORT")
            .map(|raw| match parse_port(&raw) {
                Some(port) => port,
                None => {
                    tracing::warn!(value = %raw, "invalid STATE_LOG_SERVER_PORT, using default");
                    defaults.port
                }
            })
            .unwrap_or(defaults.port);

        let read_days = var("STATE_LOG_READ_DAYS")
            .map(|raw| match raw.parse::<u32>() {
                Ok(days) if days > MAX_READ_DAYS => {
                    tracing::warn!(value = %raw, max = MAX_READ_DAYS, "STATE_LOG_READ_DAYS too large, clamping");
                    MAX_READ_DAYS
                }
                Ok(days) if days >= 1 => days,
                _ => {
                    tracing::warn!(value = %raw, "invalid STATE_LOG_READ_DAYS, using default");
                    defaults.read_days
                }
            })
            .unwrap_or(defaults.read_days);

        let log_dir = var("STATE_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        let telegram = match (var("TELEGRAM_BOT_TOKEN"), var("TELEGRAM_GROUP_ID")) {
            (Some(bot_token), Some(group)) => match group.parse::<i64>() {
                Ok(group_id) => Some(TelegramConfig {
                    bot_token,
                    group_id,
                    topic_id: var("TELEGRAM_TOPIC_ID").and_then(|raw| raw.parse().ok()),
                }),
                Err(_) => {
                    tracing::warn!(value = %group, "invalid TELEGRAM_GROUP_ID, alerts disabled");
                    None
                }
            },
            _ => None,
        };

        Self {
            port,
            read_days,
            log_dir,
            database_url: var("DATABASE_URL"),
            telegram,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_read_days(mut self, read_days: u32) -> Self {
        self.read_days = read_days.min(MAX_READ_DAYS);
        self
    }

    pub fn with_log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_telegram(mut self, telegram: TelegramConfig) -> Self {
        self.telegram = Some(telegram);
        self
    }

    /// File store settings derived from this config
    pub fn file_store_config(&self) -> FileStoreConfig {
        FileStoreConfig::new(&self.log_dir)
            .with_prefix(SERVER_LOG_PREFIX)
            .with_read_days(self.read_days)
    }
}

/// Parse a positive TCP port
pub fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse::<u16>().ok().filter(|port| *port > 0)
}
