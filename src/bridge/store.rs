//! Deduplicating message store and the per-contact aggregator.

use chrono::Utc;
use std::collections::{HashMap, VecDeque};

use super::record::{ContactSummary, MessageRecord, LOCAL_USER_LABEL};

/// Two records with matching text and counterparty closer together than this
/// are the same logical message, even with different ids. The protocol can
/// emit a message twice (echo plus live event) with a regenerated id.
pub const FUZZY_WINDOW_MS: i64 = 5000;

/// Bounded, insertion-ordered message log. Oldest records are evicted first
/// when the bound is exceeded.
#[derive(Debug)]
pub struct MessageStore {
    capacity: usize,
    messages: VecDeque<MessageRecord>,
}

impl MessageStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            messages: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageRecord> {
        self.messages.iter()
    }

    /// Try to accept a record. Duplicates are rejected unless `force` is set
    /// (the send path forces, so a just-sent message is recorded even when
    /// it races its own live echo). Returns the stamped record on acceptance.
    pub fn accept(&mut self, mut record: MessageRecord, force: bool) -> Option<MessageRecord> {
        if force {
            // Forced records come from the send path: authorship is settled.
            record.from_me = true;
            record.push_name = LOCAL_USER_LABEL.to_string();
        } else if self.is_duplicate(&record) {
            return None;
        }

        record.saved_at = Some(Utc::now());
        self.messages.push_back(record.clone());
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
        Some(record)
    }

    /// Duplicate iff an existing record has the same id (no time bound), or
    /// the same text and counterparty within the fuzzy window.
    fn is_duplicate(&self, candidate: &MessageRecord) -> bool {
        self.messages.iter().any(|existing| {
            if existing.id == candidate.id {
                return true;
            }
            existing.text == candidate.text
                && existing.from_number == candidate.from_number
                && (existing.timestamp - candidate.timestamp)
                    .num_milliseconds()
                    .abs()
                    < FUZZY_WINDOW_MS
        })
    }
}

/// One rolling summary per counterparty number. Entries are never evicted;
/// only the message log is bounded.
#[derive(Debug, Default)]
pub struct ContactBook {
    contacts: HashMap<String, ContactSummary>,
}

impl ContactBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn get(&self, phone: &str) -> Option<&ContactSummary> {
        self.contacts.get(phone)
    }

    pub fn all(&self) -> impl Iterator<Item = &ContactSummary> {
        self.contacts.values()
    }

    /// Upsert the summary for the record's counterparty. Must only be called
    /// with records the store accepted.
    pub fn update(&mut self, record: &MessageRecord) {
        let name = if record.from_me {
            LOCAL_USER_LABEL.to_string()
        } else {
            record.push_name.clone()
        };

        self.contacts
            .entry(record.from_number.clone())
            .and_modify(|summary| {
                summary.name = name.clone();
                summary.last_message = record.text.clone();
                summary.last_seen = record.timestamp;
                summary.message_count += 1;
            })
            .or_insert_with(|| ContactSummary {
                name,
                phone: record.from_number.clone(),
                last_message: record.text.clone(),
                last_seen: record.timestamp,
                message_count: 1,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::record::MessageKind;
    use chrono::{DateTime, Duration, Utc};

    fn record(id: &str, text: &str, number: &str, ts: DateTime<Utc>) -> MessageRecord {
        MessageRecord {
            id: id.into(),
            from_number: number.into(),
            text: text.into(),
            timestamp: ts,
            push_name: "Tester".into(),
            from_me: false,
            kind: MessageKind::Text,
            is_historic: false,
            saved_at: None,
        }
    }

    #[test]
    fn test_accept_stamps_saved_at() {
        let mut store = MessageStore::new(10);
        let accepted = store.accept(record("1", "hi", "123", Utc::now()), false);
        assert!(accepted.and_then(|r| r.saved_at).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_identical_id_rejected_regardless_of_time_gap() {
        let mut store = MessageStore::new(10);
        let t = Utc::now();
        assert!(store.accept(record("1", "hi", "123", t), false).is_some());
        // Same id, wildly different timestamp and text — still a duplicate.
        let far = record("1", "different", "456", t + Duration::hours(2));
        assert!(store.accept(far, false).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fuzzy_duplicate_within_window() {
        let mut store = MessageStore::new(10);
        let t = Utc::now();
        assert!(store.accept(record("1", "hi", "123", t), false).is_some());
        let near = record("2", "hi", "123", t + Duration::milliseconds(2000));
        assert!(store.accept(near, false).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_same_text_outside_window_accepted() {
        let mut store = MessageStore::new(10);
        let t = Utc::now();
        assert!(store.accept(record("1", "hi", "123", t), false).is_some());
        let later = record("3", "hi", "123", t + Duration::milliseconds(9000));
        assert!(store.accept(later, false).is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_same_text_different_counterparty_accepted() {
        let mut store = MessageStore::new(10);
        let t = Utc::now();
        assert!(store.accept(record("1", "hi", "123", t), false).is_some());
        assert!(store.accept(record("2", "hi", "999", t), false).is_some());
    }

    #[test]
    fn test_force_bypasses_both_checks() {
        let mut store = MessageStore::new(10);
        let t = Utc::now();
        assert!(store.accept(record("1", "hi", "123", t), false).is_some());
        assert!(store.accept(record("1", "hi", "123", t), true).is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_force_settles_authorship() {
        let mut store = MessageStore::new(10);
        let forced = store
            .accept(record("1", "oi", "123", Utc::now()), true)
            .expect("forced records are always accepted");
        assert!(forced.from_me);
        assert_eq!(forced.push_name, LOCAL_USER_LABEL);
    }

    #[test]
    fn test_fifo_eviction_keeps_newest() {
        let mut store = MessageStore::new(100);
        let t = Utc::now();
        for i in 0..150 {
            // Spread timestamps so the fuzzy check never fires.
            let r = record(
                &format!("id-{i}"),
                &format!("msg {i}"),
                "123",
                t + Duration::seconds(i * 10),
            );
            assert!(store.accept(r, false).is_some());
        }
        assert_eq!(store.len(), 100);
        // Survivors are messages 50..150 in original order.
        let ids: Vec<&str> = store.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids[0], "id-50");
        assert_eq!(ids[99], "id-149");
    }

    #[test]
    fn test_contact_created_then_updated() {
        let mut book = ContactBook::new();
        let t = Utc::now();
        book.update(&record("1", "oi", "123", t));
        let c = book.get("123").expect("contact exists");
        assert_eq!(c.name, "Tester");
        assert_eq!(c.message_count, 1);
        assert_eq!(c.last_message, "oi");

        book.update(&record("2", "tudo bem?", "123", t + Duration::seconds(5)));
        let c = book.get("123").expect("contact exists");
        assert_eq!(c.message_count, 2);
        assert_eq!(c.last_message, "tudo bem?");
    }

    #[test]
    fn test_contact_local_author_uses_fixed_label() {
        let mut book = ContactBook::new();
        let mut r = record("1", "enviado", "123", Utc::now());
        r.from_me = true;
        r.push_name = "whatever".into();
        book.update(&r);
        assert_eq!(book.get("123").expect("contact exists").name, LOCAL_USER_LABEL);
    }
}
