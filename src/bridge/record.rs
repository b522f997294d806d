//! Canonical message and contact records.
//!
//! Field names on the wire are camelCase and match what the N8n flows
//! consuming the webhook already expect, including the pt-BR display labels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name used for everything authored by the local account.
pub const LOCAL_USER_LABEL: &str = "Você";

/// Display name used when the protocol supplies none.
pub const UNKNOWN_NAME: &str = "Sem nome";

/// Message payload kind, derived from the protocol payload's discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Unknown,
}

/// Canonical unit of the message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Protocol message id. Historic entries carry a `-hist` suffix so a
    /// later live duplicate of the same message is still distinguishable.
    pub id: String,
    /// Counterparty phone number, domain suffix stripped.
    pub from_number: String,
    pub text: String,
    /// Observation time for live messages; protocol time for historic ones.
    pub timestamp: DateTime<Utc>,
    pub push_name: String,
    pub from_me: bool,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub is_historic: bool,
    /// Stamped when the record is accepted into the store.
    pub saved_at: Option<DateTime<Utc>>,
}

/// Rolling per-counterparty summary. Created on first accepted message,
/// updated in place, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    pub name: String,
    pub phone: String,
    pub last_message: String,
    pub last_seen: DateTime<Utc>,
    pub message_count: u64,
}
