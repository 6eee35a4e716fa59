//! Alert hook for error-state transitions
//!
//! The ingest server hands a formatted message to an [`AlertSink`] after an
//! error event has been stored. Delivery is fire-and-forget: failures are
//! logged and never affect the ingest response.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::types::ChangeEvent;

/// Maximum number of characters of the JSON-encoded value in an alert
pub const ALERT_VALUE_LIMIT: usize = 500;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Alert delivery errors
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("send failed: {status} {body}")]
    Rejected { status: u16, body: String },
}

/// Receiver of alert text
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, text: String) -> Result<(), AlertError>;
}

/// Render the alert text for an error event
pub fn format_alert(event: &ChangeEvent) -> String {
    let value: String = event
        .value
        .to_string()
        .chars()
        .take(ALERT_VALUE_LIMIT)
        .collect();
    format!(
        "State log error\nComponent: {}\nKey: {}\nValue: {}",
        event.component_name, event.key, value
    )
}

/// Telegram bot credentials and destination chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub group_id: i64,
    /// Forum topic inside the group
    pub topic_id: Option<i64>,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_thread_id: Option<i64>,
}

/// Posts alerts to a Telegram chat through the Bot API
pub struct TelegramSink {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramSink {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!("{}/bot{}/sendMessage", TELEGRAM_API, self.config.bot_token)
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    async fn notify(&self, text: String) -> Result<(), AlertError> {
        let body = SendMessage {
            chat_id: self.config.group_id,
            text: &text,
            message_thread_id: self.config.topic_id,
        };

        let response = self.client.post(self.url()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AlertError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn error_event(value: serde_json::Value) -> ChangeEvent {
        ChangeEvent {
            component_name: "Checkout".to_string(),
            key: "payment".to_string(),
            value,
            value_hash: "h".to_string(),
            is_error: true,
            meta: None,
            client_ts: None,
            server_ts: "2024-01-01T00:00:00.000Z".to_string(),
            source: "frontend".to_string(),
        }
    }

    #[test]
    fn test_format_alert() {
        let text = format_alert(&error_event(json!({"code": 402})));
        assert_eq!(
            text,
            "State log error\nComponent: Checkout\nKey: payment\nValue: {\"code\":402}"
        );
    }

    #[test]
    fn test_format_alert_truncates_value() {
        let text = format_alert(&error_event(json!("x".repeat(2000))));
        let value = text.rsplit("Value: ").next().unwrap();
        assert_eq!(value.chars().count(), ALERT_VALUE_LIMIT);
        assert!(value.starts_with("\"xxx"));
    }

    #[test]
    fn test_telegram_payload() {
        let body = SendMessage {
            chat_id: -100,
            text: "hi",
            message_thread_id: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"chat_id": -100, "text": "hi"})
        );

        let sink = TelegramSink::new(TelegramConfig {
            bot_token: "123:abc".to_string(),
            group_id: -100,
            topic_id: Some(7),
        });
        assert_eq!(sink.url(), "https://api.telegram.org/bot123:abc/sendMessage");
    }
}
