//! Shared application state for request handlers

use std::sync::Arc;

use super::alert::AlertSink;
use crate::event_store::LogStore;
use crate::types::ChangeEvent;
use crate::utils::ServerTimestamps;

/// State shared by all handlers
pub struct AppState {
    /// Event log backend
    pub store: Arc<dyn LogStore>,

    /// Optional receiver for error-event alerts
    pub alert: Option<Arc<dyn AlertSink>>,

    /// Source of strictly increasing `serverTs` values
    pub timestamps: ServerTimestamps,
}

impl AppState {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self {
            store,
            alert: None,
            timestamps: ServerTimestamps::new(),
        }
    }

    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert = Some(sink);
        self
    }

    /// Fire the alert hook for a stored error event without waiting on it
    pub fn dispatch_alert(&self, event: &ChangeEvent) {
        let Some(sink) = self.alert.clone() else {
            return;
        };
        if !event.is_error {
            return;
        }

        let text = super::alert::format_alert(event);
        tokio::spawn(async move {
            if let Err(e) = sink.notify(text).await {
                tracing::warn!(error = %e, "alert delivery failed");
            }
        });
    }
}
