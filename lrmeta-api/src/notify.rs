//! Chat-ops notifications for renewal outcomes
//!
//! Messages go to a Slack-compatible incoming webhook as `{"text": ...}`.
//! Without a configured URL notifications are silently disabled. Delivery
//! failures are logged and never propagate.

use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    webhook: Option<String>,
}

impl Notifier {
    pub fn new(webhook: &str) -> Self {
        let webhook = webhook.trim();
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            webhook: (!webhook.is_empty()).then(|| webhook.to_string()),
        }
    }

    pub fn disabled() -> Self {
        Self::new("")
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook.is_some()
    }

    pub async fn send(&self, text: &str) {
        let Some(url) = &self.webhook else {
            debug!("No webhook configured, notification dropped");
            return;
        };

        let result = self
            .client
            .post(url)
            .json(&json!({ "text": text }))
            .send()
            .await
            .and_then(|response| response.error_for_status());

        if let Err(e) = result {
            warn!("Failed to send notification: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_webhook_disables() {
        assert!(!Notifier::new("  ").is_enabled());
        assert!(!Notifier::disabled().is_enabled());
        assert!(Notifier::new("https://hooks.example.org/T000").is_enabled());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let notifier = Notifier::new("http://127.0.0.1:9/hook");
        notifier.send("Cache renewal completed.").await;
    }
}
