//! WhatsApp transport integration.
//!
//! Runs a WhatsApp Web client (via `whatsapp-rust`) next to the HTTP
//! surface, feeding live message events into the bridge pipeline and
//! exposing a send primitive. Pairing state (QR code) and the connected
//! client handle are shared through [`ConnectionState`].

mod agent;
pub(crate) mod handler;
pub mod history;
pub(crate) mod session_store;

pub use agent::BridgeChannel;

use std::sync::Arc;
use tokio::sync::Mutex;
use wacore_binary::jid::Jid;
use whatsapp_rust::client::Client;

use crate::config::normalize_number;
use crate::error::{BridgeError, Result};

/// Shared WhatsApp connection state.
///
/// Written by the bot's event handler, read by the HTTP handlers and the
/// send path.
pub struct ConnectionState {
    client: Mutex<Option<Arc<Client>>>,
    /// Current pairing QR payload, present only while pairing is pending.
    qr_code: Mutex<Option<String>>,
    /// Local account number (digits). Seeded from config when given,
    /// otherwise learned from the first from-me event after connecting.
    own_id: Mutex<Option<String>>,
}

impl ConnectionState {
    pub fn new(own_number: Option<String>) -> Self {
        Self {
            client: Mutex::new(None),
            qr_code: Mutex::new(None),
            own_id: Mutex::new(own_number.filter(|n| !n.is_empty())),
        }
    }

    /// Store the connected client and drop any pending QR code.
    pub async fn set_connected(&self, client: Arc<Client>) {
        *self.client.lock().await = Some(client);
        *self.qr_code.lock().await = None;
    }

    pub async fn set_disconnected(&self) {
        *self.client.lock().await = None;
    }

    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    pub async fn client(&self) -> Option<Arc<Client>> {
        self.client.lock().await.clone()
    }

    pub async fn set_qr(&self, code: String) {
        *self.qr_code.lock().await = Some(code);
    }

    pub async fn qr_code(&self) -> Option<String> {
        self.qr_code.lock().await.clone()
    }

    pub async fn own_id(&self) -> Option<String> {
        self.own_id.lock().await.clone()
    }

    /// Capture the local account identifier once. Later calls are ignored so
    /// a configured value is never overwritten by a learned one.
    pub async fn learn_own_id(&self, id: &str) {
        let digits = normalize_number(id);
        if digits.is_empty() {
            return;
        }
        let mut own = self.own_id.lock().await;
        if own.is_none() {
            tracing::info!("learned own account id: {digits}");
            *own = Some(digits);
        }
    }
}

/// Turn a phone number (or full JID) into a user JID.
pub fn to_user_jid(number: &str) -> Result<Jid> {
    let jid_str = if number.contains('@') {
        number.to_string()
    } else {
        let digits = normalize_number(number);
        if digits.is_empty() {
            return Err(BridgeError::InvalidRequest(format!(
                "'{number}' contains no phone number"
            )));
        }
        format!("{digits}@s.whatsapp.net")
    };
    jid_str
        .parse()
        .map_err(|e| BridgeError::InvalidRequest(format!("invalid JID '{jid_str}': {e}")))
}

/// Send a text message. Returns the protocol message id.
pub async fn send_text(state: &ConnectionState, number: &str, text: &str) -> Result<String> {
    let client = state.client().await.ok_or(BridgeError::NotConnected)?;
    let jid = to_user_jid(number)?;
    let message = waproto::whatsapp::Message {
        conversation: Some(text.to_string()),
        ..Default::default()
    };
    client
        .send_message(jid, message)
        .await
        .map_err(|e| BridgeError::Transport(format!("send failed: {e}")))
}
