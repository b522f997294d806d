//! Live message event handling.
//!
//! One entry point per incoming protocol message: normalize, accept into
//! the store, then hand the accepted record to the webhook sink without
//! waiting on delivery. Errors here never propagate back into the bot's
//! event loop.

use std::sync::Arc;

use wacore::types::message::MessageInfo;
use waproto::whatsapp::Message;

use super::ConnectionState;
use crate::bridge::normalizer;
use crate::bridge::Bridge;
use crate::webhook::{self, WebhookSink};

/// Counterparty identifiers shorter than this are system chats
/// (status broadcasts, service notices), not phone numbers.
const MIN_NUMBER_LEN: usize = 10;

pub async fn handle_message(
    msg: &Message,
    info: &MessageInfo,
    state: &Arc<ConnectionState>,
    bridge: &Arc<Bridge>,
    sink: &WebhookSink,
) {
    if info.source.is_from_me {
        state.learn_own_id(&info.source.sender.user).await;
    }

    let own_id = state.own_id().await;
    let record = normalizer::normalize_live(msg, info, own_id.as_deref());

    if record.from_number.len() < MIN_NUMBER_LEN {
        tracing::debug!(
            "ignoring message from system chat '{}'",
            record.from_number
        );
        return;
    }

    let direction = if record.from_me { "sent" } else { "received" };
    match bridge.record(record, false).await {
        Some(accepted) => {
            tracing::info!(
                "message {direction}: {} <{}>: {}",
                accepted.push_name,
                accepted.from_number,
                preview(&accepted.text),
            );
            webhook::deliver_detached(sink, accepted);
        }
        None => {
            tracing::debug!("duplicate message dropped ({direction})");
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= 60 {
        text.to_string()
    } else {
        let mut p: String = text.chars().take(60).collect();
        p.push_str("...");
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("curta"), "curta");
        let long = "a".repeat(100);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), 63);
        assert!(shown.ends_with("..."));
    }
}
