//! Conversation history backfill.
//!
//! The transport library exposes no on-demand chat history API, so history
//! access sits behind the [`HistorySource`] trait. When no source is wired
//! in, the backfill is skipped and the on-demand history endpoint reports
//! history as unavailable. Backfilled records flow through the same
//! normalize + accept path as live events but are never forwarded to the
//! webhook.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::bridge::normalizer::{normalize_historic, HistoricMessage};
use crate::bridge::Bridge;
use crate::error::Result;

/// Provider of stored conversation history.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// JIDs of the most recently active chats, newest first.
    async fn recent_chats(&self, limit: usize) -> Result<Vec<String>>;

    /// Messages of one chat, newest first.
    async fn fetch_messages(&self, chat_jid: &str, limit: usize) -> Result<Vec<HistoricMessage>>;
}

/// Pull recent history into the store. Runs once per connection, paced with
/// a fixed delay between chats so the backfill never bursts. A failing chat
/// is logged and skipped. Returns the number of records accepted.
pub async fn run_backfill(
    source: &dyn HistorySource,
    bridge: &Bridge,
    own_id: Option<&str>,
    chat_limit: usize,
    per_chat_limit: usize,
    delay: Duration,
) -> usize {
    let chats = match source.recent_chats(chat_limit).await {
        Ok(chats) => chats,
        Err(e) => {
            tracing::warn!("backfill: chat listing failed: {e}");
            return 0;
        }
    };
    tracing::info!("backfill: importing history from {} chats", chats.len());

    let mut accepted = 0;
    for (i, chat) in chats.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }
        let messages = match source.fetch_messages(chat, per_chat_limit).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!("backfill: skipping chat {chat}: {e}");
                continue;
            }
        };
        for historic in &messages {
            let record = normalize_historic(historic, own_id);
            if bridge.record(record, false).await.is_some() {
                accepted += 1;
            }
        }
    }
    tracing::info!("backfill: accepted {accepted} historic messages");
    accepted
}

/// Fetch and normalize one chat's history without touching the store.
pub async fn fetch_normalized(
    source: &dyn HistorySource,
    chat_jid: &str,
    limit: usize,
    own_id: Option<&str>,
) -> Result<Vec<crate::bridge::MessageRecord>> {
    let messages = source.fetch_messages(chat_jid, limit).await?;
    Ok(messages
        .iter()
        .map(|h| normalize_historic(h, own_id))
        .collect())
}

/// Spawn the backfill as a detached task.
pub fn spawn_backfill(
    source: Arc<dyn HistorySource>,
    bridge: Arc<Bridge>,
    own_id: Option<String>,
    chat_limit: usize,
    per_chat_limit: usize,
    delay: Duration,
) {
    tokio::spawn(async move {
        run_backfill(
            source.as_ref(),
            &bridge,
            own_id.as_deref(),
            chat_limit,
            per_chat_limit,
            delay,
        )
        .await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MessageFilter;
    use crate::error::BridgeError;
    use chrono::Utc;
    use std::collections::HashMap;

    struct MockSource {
        chats: Vec<String>,
        messages: HashMap<String, Vec<HistoricMessage>>,
        failing_chat: Option<String>,
    }

    #[async_trait]
    impl HistorySource for MockSource {
        async fn recent_chats(&self, limit: usize) -> Result<Vec<String>> {
            Ok(self.chats.iter().take(limit).cloned().collect())
        }

        async fn fetch_messages(
            &self,
            chat_jid: &str,
            limit: usize,
        ) -> Result<Vec<HistoricMessage>> {
            if self.failing_chat.as_deref() == Some(chat_jid) {
                return Err(BridgeError::HistoryUnavailable("sync pending".into()));
            }
            Ok(self
                .messages
                .get(chat_jid)
                .map(|m| m.iter().take(limit).cloned().collect())
                .unwrap_or_default())
        }
    }

    fn historic(id: &str, chat: &str, text: &str) -> HistoricMessage {
        HistoricMessage {
            id: id.into(),
            chat: chat.into(),
            sender: chat.into(),
            from_me: false,
            push_name: Some("Contato".into()),
            timestamp: Utc::now(),
            message: waproto::whatsapp::Message {
                conversation: Some(text.to_string()),
                ..Default::default()
            },
        }
    }

    fn source_with_two_chats() -> MockSource {
        let chat_a = "5511111111111@s.whatsapp.net".to_string();
        let chat_b = "5522222222222@s.whatsapp.net".to_string();
        let mut messages = HashMap::new();
        messages.insert(
            chat_a.clone(),
            vec![historic("A1", &chat_a, "oi"), historic("A2", &chat_a, "tudo bem?")],
        );
        messages.insert(chat_b.clone(), vec![historic("B1", &chat_b, "bom dia")]);
        MockSource {
            chats: vec![chat_a, chat_b],
            messages,
            failing_chat: None,
        }
    }

    #[tokio::test]
    async fn test_backfill_imports_all_chats() {
        let source = source_with_two_chats();
        let bridge = Bridge::new(100);
        let accepted =
            run_backfill(&source, &bridge, None, 5, 20, Duration::from_millis(1)).await;
        assert_eq!(accepted, 3);

        let records = bridge.messages(&MessageFilter::default()).await;
        assert!(records.iter().all(|r| r.is_historic));
        assert!(records.iter().all(|r| r.id.ends_with("-hist")));
    }

    #[tokio::test]
    async fn test_backfill_respects_chat_limit() {
        let source = source_with_two_chats();
        let bridge = Bridge::new(100);
        let accepted =
            run_backfill(&source, &bridge, None, 1, 20, Duration::from_millis(1)).await;
        assert_eq!(accepted, 2);
    }

    #[tokio::test]
    async fn test_backfill_skips_failing_chat() {
        let mut source = source_with_two_chats();
        source.failing_chat = Some("5511111111111@s.whatsapp.net".into());
        let bridge = Bridge::new(100);
        let accepted =
            run_backfill(&source, &bridge, None, 5, 20, Duration::from_millis(1)).await;
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn test_backfill_is_idempotent() {
        let source = source_with_two_chats();
        let bridge = Bridge::new(100);
        run_backfill(&source, &bridge, None, 5, 20, Duration::from_millis(1)).await;
        // Reconnect replays the same history; everything is a duplicate.
        let second =
            run_backfill(&source, &bridge, None, 5, 20, Duration::from_millis(1)).await;
        assert_eq!(second, 0);
        let (count, _) = bridge.counts().await;
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_fetch_normalized_bypasses_store() {
        let source = source_with_two_chats();
        let records = fetch_normalized(&source, "5511111111111@s.whatsapp.net", 20, None)
            .await
            .expect("source is healthy");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.saved_at.is_none()));
    }
}
