//! Keep-alive self pings.
//!
//! Free-tier container hosts idle services out after ~15 minutes without
//! traffic. When a public self URL is configured, ping our own health
//! endpoint on a fixed interval. Failures are logged and ignored.

use std::time::Duration;

/// Spawn the keep-alive loop. No-op when `self_url` is `None`.
pub fn spawn(self_url: Option<String>, interval: Duration) {
    let Some(url) = self_url.filter(|u| !u.is_empty()) else {
        tracing::debug!("no SELF_URL configured, keep-alive disabled");
        return;
    };

    let target = format!("{}/health", url.trim_end_matches('/'));
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it so we don't ping at boot.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match client.get(&target).send().await {
                Ok(response) => {
                    tracing::debug!("keep-alive ping: HTTP {}", response.status());
                }
                Err(e) => {
                    tracing::warn!("keep-alive ping failed: {e}");
                }
            }
        }
    });
}
