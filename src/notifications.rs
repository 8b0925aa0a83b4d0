use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::chat::screen::Button;
use crate::errors::ServiceError;

/// Who an outbound chat message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Client(i64),
    Operator,
}

/// An image delivered alongside a message, e.g. fulfillment photos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub image: String,
    pub caption: Option<String>,
}

/// A chat message pushed to a buyer or the operator outside of the
/// request/response cycle (payment alerts, fulfillment, rejections).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipient: Recipient,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyboard: Vec<Vec<Button>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    pub fn to_client(client_id: i64, text: impl Into<String>) -> Self {
        Self {
            recipient: Recipient::Client(client_id),
            text: text.into(),
            keyboard: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn to_operator(text: impl Into<String>) -> Self {
        Self {
            recipient: Recipient::Operator,
            text: text.into(),
            keyboard: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn with_keyboard(mut self, keyboard: Vec<Vec<Button>>) -> Self {
        self.keyboard = keyboard;
        self
    }

    pub fn with_attachment(mut self, image: impl Into<String>, caption: Option<String>) -> Self {
        self.attachments.push(Attachment {
            image: image.into(),
            caption,
        });
        self
    }
}

/// Transport for outbound messages. The storefront never blocks an order
/// on delivery; callers log failures and move on.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), ServiceError>;
}

/// Delivers outbound messages to the chat gateway over HTTP.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
}

impl WebhookNotifier {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            max_retries: 3,
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookNotifier {
    async fn send(&self, message: OutboundMessage) -> Result<(), ServiceError> {
        let body = serde_json::to_string(&message)
            .map_err(|e| ServiceError::NotificationError(e.to_string()))?;

        for attempt in 1..=self.max_retries {
            let request = self
                .client
                .post(&self.endpoint)
                .timeout(Duration::from_secs(10))
                .header("Content-Type", "application/json")
                .body(body.clone());

            match request.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        info!("Outbound message delivered to {}", self.endpoint);
                        return Ok(());
                    } else {
                        warn!(
                            "Outbound delivery failed with status: {} (attempt {}/{})",
                            response.status(),
                            attempt,
                            self.max_retries
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        "Outbound delivery error: {} (attempt {}/{})",
                        e, attempt, self.max_retries
                    );
                }
            }

            // Exponential backoff: 1s, 2s, 4s
            if attempt < self.max_retries {
                let backoff = Duration::from_secs(2_u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }
        }

        error!(
            "Outbound delivery failed after {} attempts",
            self.max_retries
        );
        Err(ServiceError::NotificationError(format!(
            "Failed to deliver message after {} retries",
            self.max_retries
        )))
    }
}

/// Fallback channel used when no gateway endpoint is configured.
pub struct LogNotifier;

#[async_trait]
impl NotificationChannel for LogNotifier {
    async fn send(&self, message: OutboundMessage) -> Result<(), ServiceError> {
        info!(
            recipient = ?message.recipient,
            attachments = message.attachments.len(),
            "Outbound message: {}",
            message.text
        );
        Ok(())
    }
}
