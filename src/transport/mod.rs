//! Ingest transport
//!
//! Ships change events to an ingest server. Sending is best-effort: it
//! never blocks, never retries and never reports failure to the caller.
//! Where events go is decided once, from an explicit [`TransportConfig`].

mod config;

use reqwest::Client;
use thiserror::Error;
use tokio::runtime::Handle;

use crate::emitter::EventSink;
use crate::types::ChangeEvent;

pub use config::{normalize_remote_url, Destination, RuntimeMode, TransportConfig};

/// Ingest path on the server
pub const INGEST_PATH: &str = "/ingest";

/// Port of the local offline server when nothing else is configured
pub const DEFAULT_PORT: u16 = 8787;

/// Errors from a single delivery attempt
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is disabled")]
    Disabled,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("ingest server answered {0}")]
    Status(u16),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Sends change events to the resolved ingest endpoint
#[derive(Debug, Clone)]
pub struct IngestTransport {
    endpoint: Option<String>,
    client: Option<Client>,
}

impl IngestTransport {
    pub fn new(config: &TransportConfig) -> Self {
        let endpoint = config.resolve_endpoint();
        let client = match endpoint {
            Some(_) => match Client::builder().build() {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!(error = %e, "HTTP client unavailable, state log transport disabled");
                    None
                }
            },
            None => None,
        };

        if let Some(endpoint) = &endpoint {
            tracing::debug!(endpoint = %endpoint, "state log transport enabled");
        }

        Self { endpoint, client }
    }

    /// A transport that drops everything
    pub fn disabled() -> Self {
        Self {
            endpoint: None,
            client: None,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some() && self.client.is_some()
    }

    /// Fire-and-forget delivery.
    ///
    /// Spawns the request on the current tokio runtime and returns
    /// immediately. Called outside a runtime, the request runs on a detached
    /// thread with its own single-threaded runtime instead. Without an
    /// endpoint the event is dropped.
    pub fn send(&self, event: &ChangeEvent) {
        let (Some(endpoint), Some(client)) = (self.endpoint.clone(), self.client.clone()) else {
            return;
        };

        let body = match serde_json::to_value(event.ingest_body()) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "could not encode state log event");
                return;
            }
        };

        let delivery = async move {
            if let Err(e) = post(&client, &endpoint, &body).await {
                tracing::debug!(error = %e, endpoint = %endpoint, "state log delivery failed");
            }
        };

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(delivery);
            }
            Err(_) => {
                let spawned = std::thread::Builder::new()
                    .name("state-log-send".to_string())
                    .spawn(move || {
                        match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                            Ok(runtime) => runtime.block_on(delivery),
                            Err(e) => tracing::debug!(error = %e, "no runtime for state log delivery"),
                        }
                    });
                if let Err(e) = spawned {
                    tracing::debug!(error = %e, "could not start state log delivery thread");
                }
            }
        }
    }

    /// Deliver and wait for the server's answer
    pub async fn deliver(&self, event: &ChangeEvent) -> TransportResult<()> {
        let (Some(endpoint), Some(client)) = (&self.endpoint, &self.client) else {
            return Err(TransportError::Disabled);
        };
        let body = serde_json::to_value(event.ingest_body())?;
        post(client, endpoint, &body).await
    }
}

impl EventSink for IngestTransport {
    fn emit(&self, event: ChangeEvent) {
        self.send(&event);
    }
}

async fn post(client: &Client, endpoint: &str, body: &serde_json::Value) -> TransportResult<()> {
    let response = client.post(endpoint).json(body).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status(status.as_u16()));
    }
    Ok(())
}
