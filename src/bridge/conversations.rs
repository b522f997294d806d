//! Conversation views, derived on demand from the store and contact book.
//!
//! Recomputed on every call — message volume is bounded by the store's
//! capacity, so there is nothing to maintain incrementally.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::record::{ContactSummary, MessageRecord, UNKNOWN_NAME};
use super::store::{ContactBook, MessageStore};

/// One conversation: every stored message for a counterparty, oldest first,
/// plus summary fields derived from the chronologically last message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub phone: String,
    pub contact: ContactSummary,
    pub messages: Vec<MessageRecord>,
    pub last_message: String,
    pub last_timestamp: DateTime<Utc>,
    pub last_from_me: bool,
}

/// Partition the stored log by counterparty and build per-conversation views.
/// Conversations come out ordered by most recent activity first.
pub fn group_all(store: &MessageStore, contacts: &ContactBook) -> Vec<Conversation> {
    let mut partitions: BTreeMap<&str, Vec<&MessageRecord>> = BTreeMap::new();
    for record in store.iter() {
        partitions
            .entry(record.from_number.as_str())
            .or_default()
            .push(record);
    }

    let mut conversations: Vec<Conversation> = partitions
        .into_iter()
        .filter_map(|(phone, mut records)| {
            records.sort_by_key(|r| r.timestamp);
            let last = *records.last()?;

            let contact = contacts.get(phone).cloned().unwrap_or_else(|| ContactSummary {
                name: UNKNOWN_NAME.to_string(),
                phone: phone.to_string(),
                last_message: last.text.clone(),
                last_seen: last.timestamp,
                message_count: records.len() as u64,
            });

            Some(Conversation {
                phone: phone.to_string(),
                contact,
                last_message: last.text.clone(),
                last_timestamp: last.timestamp,
                last_from_me: last.from_me,
                messages: records.into_iter().cloned().collect(),
            })
        })
        .collect();

    conversations.sort_by(|a, b| b.last_timestamp.cmp(&a.last_timestamp));
    conversations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::record::MessageKind;
    use chrono::Duration;

    fn record(id: &str, text: &str, number: &str, ts: DateTime<Utc>, from_me: bool) -> MessageRecord {
        MessageRecord {
            id: id.into(),
            from_number: number.into(),
            text: text.into(),
            timestamp: ts,
            push_name: "Tester".into(),
            from_me,
            kind: MessageKind::Text,
            is_historic: false,
            saved_at: None,
        }
    }

    #[test]
    fn test_groups_by_counterparty_sorted_ascending() {
        let mut store = MessageStore::new(50);
        let mut contacts = ContactBook::new();
        let t = Utc::now();

        // Deliberately out of order.
        for (id, text, offset) in [("a", "second", 10), ("b", "first", 0), ("c", "third", 20)] {
            let r = record(id, text, "123", t + Duration::seconds(offset), false);
            let accepted = store.accept(r, false).expect("accepted");
            contacts.update(&accepted);
        }

        let conversations = group_all(&store, &contacts);
        assert_eq!(conversations.len(), 1);
        let convo = &conversations[0];
        let texts: Vec<&str> = convo.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(convo.last_message, "third");
        assert_eq!(convo.last_timestamp, t + Duration::seconds(20));
    }

    #[test]
    fn test_last_from_me_reflects_final_message() {
        let mut store = MessageStore::new(50);
        let contacts = ContactBook::new();
        let t = Utc::now();
        store
            .accept(record("a", "oi", "123", t, false), false)
            .expect("accepted");
        store
            .accept(record("b", "resposta", "123", t + Duration::seconds(5), true), false)
            .expect("accepted");

        let conversations = group_all(&store, &contacts);
        assert!(conversations[0].last_from_me);
    }

    #[test]
    fn test_synthesizes_contact_when_missing() {
        let mut store = MessageStore::new(50);
        let contacts = ContactBook::new();
        store
            .accept(record("a", "oi", "777", Utc::now(), false), false)
            .expect("accepted");

        let conversations = group_all(&store, &contacts);
        let contact = &conversations[0].contact;
        assert_eq!(contact.phone, "777");
        assert_eq!(contact.name, UNKNOWN_NAME);
        assert_eq!(contact.message_count, 1);
    }

    #[test]
    fn test_conversations_ordered_by_recency() {
        let mut store = MessageStore::new(50);
        let contacts = ContactBook::new();
        let t = Utc::now();
        store
            .accept(record("a", "old", "111", t, false), false)
            .expect("accepted");
        store
            .accept(record("b", "new", "222", t + Duration::seconds(60), false), false)
            .expect("accepted");

        let conversations = group_all(&store, &contacts);
        assert_eq!(conversations[0].phone, "222");
        assert_eq!(conversations[1].phone, "111");
    }
}
