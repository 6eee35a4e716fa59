//! Transport configuration and endpoint resolution

use std::env;

use super::{DEFAULT_PORT, INGEST_PATH};

/// Where change events are sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Destination {
    /// Nowhere; sending is a no-op
    #[default]
    None,
    /// A local offline server on the loopback interface
    Offline,
    /// An arbitrary ingest server base URL
    Remote(String),
}

/// Runtime context of the producing process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Development,
    Production,
}

impl RuntimeMode {
    /// Debug builds are development, release builds are production
    pub fn detect() -> Self {
        if cfg!(debug_assertions) {
            RuntimeMode::Development
        } else {
            RuntimeMode::Production
        }
    }
}

impl Default for RuntimeMode {
    fn default() -> Self {
        Self::detect()
    }
}

/// Explicit transport configuration, passed at construction time
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    pub destination: Destination,
    pub mode: RuntimeMode,
    /// Port from the environment (`STATE_LOG_SERVER_PORT`)
    pub env_port: Option<u16>,
    /// Port supplied at runtime, e.g. by a server started in-process
    pub runtime_port: Option<u16>,
}

impl TransportConfig {
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            ..Default::default()
        }
    }

    /// Like [`TransportConfig::new`], with `env_port` read from
    /// `STATE_LOG_SERVER_PORT`
    pub fn from_env(destination: Destination) -> Self {
        let env_port = env::var("STATE_LOG_SERVER_PORT")
            .ok()
            .and_then(|raw| raw.trim().parse::<u16>().ok())
            .filter(|port| *port > 0);
        Self {
            env_port,
            ..Self::new(destination)
        }
    }

    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_runtime_port(mut self, port: u16) -> Self {
        self.runtime_port = Some(port);
        self
    }

    /// Offline server port: environment, then runtime override, then default
    pub fn offline_port(&self) -> u16 {
        self.env_port.or(self.runtime_port).unwrap_or(DEFAULT_PORT)
    }

    /// Resolve the ingest endpoint, or `None` when sending is disabled.
    ///
    /// The offline destination only resolves in development mode.
    pub fn resolve_endpoint(&self) -> Option<String> {
        match &self.destination {
            Destination::None => None,
            Destination::Offline => match self.mode {
                RuntimeMode::Development => Some(format!(
                    "http://127.0.0.1:{}{}",
                    self.offline_port(),
                    INGEST_PATH
                )),
                RuntimeMode::Production => None,
            },
            Destination::Remote(url) => Some(normalize_remote_url(url)),
        }
    }
}

/// Ensure a base URL ends in exactly one ingest path
pub fn normalize_remote_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.ends_with(INGEST_PATH) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, INGEST_PATH)
    }
}
