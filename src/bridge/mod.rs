//! Core message pipeline: normalization, authorship, deduplicated storage,
//! contact aggregation and conversation views.
//!
//! [`Bridge`] is the process-wide context object. The store and contact book
//! sit behind one lock so an accept and its contact update are atomic and
//! HTTP readers always see a consistent snapshot. Only the event pipeline
//! and the send path mutate it.

pub mod authorship;
pub mod conversations;
pub mod normalizer;
pub mod record;
pub mod store;

pub use conversations::Conversation;
pub use record::{ContactSummary, MessageKind, MessageRecord, LOCAL_USER_LABEL, UNKNOWN_NAME};

use tokio::sync::Mutex;

use store::{ContactBook, MessageStore};

/// Filters for the message listing endpoint.
#[derive(Debug, Default, Clone)]
pub struct MessageFilter {
    pub phone: Option<String>,
    /// Keep only messages authored locally.
    pub from_me: bool,
    /// Keep only messages received from counterparties.
    pub received: bool,
    pub limit: Option<usize>,
}

#[derive(Debug)]
struct LogState {
    store: MessageStore,
    contacts: ContactBook,
}

/// Process-wide message state. Shared via `Arc`, mutated only through
/// [`Bridge::record`].
#[derive(Debug)]
pub struct Bridge {
    log: Mutex<LogState>,
}

impl Bridge {
    pub fn new(capacity: usize) -> Self {
        Self {
            log: Mutex::new(LogState {
                store: MessageStore::new(capacity),
                contacts: ContactBook::new(),
            }),
        }
    }

    /// Run a record through accept + contact aggregation. Returns the stamped
    /// record when accepted, `None` when rejected as a duplicate. The contact
    /// book is only touched for accepted records.
    pub async fn record(&self, record: MessageRecord, force: bool) -> Option<MessageRecord> {
        let mut log = self.log.lock().await;
        let accepted = log.store.accept(record, force)?;
        log.contacts.update(&accepted);
        Some(accepted)
    }

    /// Filtered, time-descending slice of the message log.
    pub async fn messages(&self, filter: &MessageFilter) -> Vec<MessageRecord> {
        let log = self.log.lock().await;
        let mut records: Vec<MessageRecord> = log
            .store
            .iter()
            .filter(|r| match filter.phone {
                Some(ref phone) => r.from_number == *phone,
                None => true,
            })
            .filter(|r| !filter.from_me || r.from_me)
            .filter(|r| !filter.received || !r.from_me)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        records
    }

    pub async fn contacts(&self) -> Vec<ContactSummary> {
        let log = self.log.lock().await;
        let mut all: Vec<ContactSummary> = log.contacts.all().cloned().collect();
        all.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        all
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        let log = self.log.lock().await;
        conversations::group_all(&log.store, &log.contacts)
    }

    /// `(message count, contact count)` snapshot.
    pub async fn counts(&self) -> (usize, usize) {
        let log = self.log.lock().await;
        (log.store.len(), log.contacts.len())
    }
}
