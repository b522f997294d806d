//! Fire-and-forget webhook delivery.
//!
//! Every accepted message is POSTed to the configured automation webhook.
//! Delivery failures are logged and dropped — never retried, and never
//! allowed to influence acceptance into the store (delivery is spawned
//! after the store has already accepted the record).

use serde::Serialize;

use crate::bridge::MessageRecord;

/// Webhook delivery client. Cheap to clone; spawn deliveries freely.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookSink {
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.filter(|u| !u.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Target URL truncated for status display, never the full secret path.
    pub fn display_url(&self) -> Option<String> {
        self.url.as_deref().map(|u| {
            let mut shown: String = u.chars().take(50).collect();
            if u.chars().count() > 50 {
                shown.push_str("...");
            }
            shown
        })
    }

    /// Deliver a message record to the webhook.
    pub async fn deliver(&self, record: &MessageRecord) {
        let direction = if record.from_me { "sent" } else { "received" };
        self.post(record, direction).await;
    }

    /// Deliver an arbitrary JSON payload (test endpoint).
    pub async fn deliver_raw<T: Serialize + Sync>(&self, payload: &T, label: &str) {
        self.post(payload, label).await;
    }

    async fn post<T: Serialize + Sync>(&self, payload: &T, label: &str) {
        let Some(ref url) = self.url else {
            tracing::debug!("webhook not configured, dropping {label} payload");
            return;
        };

        match self.client.post(url).json(payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("webhook delivered ({label})");
            }
            Ok(response) => {
                tracing::warn!("webhook rejected ({label}): HTTP {}", response.status());
            }
            Err(e) => {
                tracing::warn!("webhook unreachable ({label}): {e}");
            }
        }
    }
}

/// Spawn a delivery without waiting for it.
pub fn deliver_detached(sink: &WebhookSink, record: MessageRecord) {
    let sink = sink.clone();
    tokio::spawn(async move {
        sink.deliver(&record).await;
    });
}
