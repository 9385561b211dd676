//! Push gateway client
//!
//! Posts one outbox notification at a time to an HTTP push gateway.

use std::time::Duration;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use crate::config::PushConfig;
use crate::models::Notification;
use crate::utils::errors::{EncontroError, Result};

/// Payload accepted by the push gateway
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage<'a> {
    pub notification_id: i64,
    pub user_id: i64,
    pub event_id: Option<i64>,
    pub kind: &'a str,
    pub title: &'a str,
    pub message: &'a str,
}

impl<'a> From<&'a Notification> for PushMessage<'a> {
    fn from(notification: &'a Notification) -> Self {
        Self {
            notification_id: notification.id,
            user_id: notification.user_id,
            event_id: notification.event_id,
            kind: notification.kind.as_str(),
            title: &notification.title,
            message: &notification.message,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PushClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl PushClient {
    pub fn new(config: &PushConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/notifications", config.gateway_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    /// Deliver one notification; 5xx answers are reported as retryable
    pub async fn send(&self, notification: &Notification) -> Result<()> {
        debug!(notification_id = notification.id, user_id = notification.user_id, "Pushing notification");

        let mut request = self.client.post(&self.endpoint).json(&PushMessage::from(notification));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(EncontroError::ServiceUnavailable(format!("Push gateway HTTP {}: {}", status, body)))
        } else {
            Err(EncontroError::InvalidInput(format!("Push gateway rejected notification HTTP {}: {}", status, body)))
        }
    }
}
