//! Error types for the bridge.
//!
//! Transport errors never crash the process (the connection supervisor
//! retries on a delay); delivery errors are logged and dropped; validation
//! errors surface to HTTP callers as 4xx responses.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// WhatsApp transport failure (connect, send, download).
    #[error("transport error: {0}")]
    Transport(String),

    /// The WhatsApp client is not connected.
    #[error("WhatsApp is not connected")]
    NotConnected,

    /// Caller supplied an invalid or incomplete request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// History fetch is not available on the current transport.
    #[error("history fetch unavailable: {0}")]
    HistoryUnavailable(String),

    /// Webhook delivery failure. Logged, never retried.
    #[error("webhook delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True for errors the HTTP layer should report as a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BridgeError::NotConnected
                | BridgeError::InvalidRequest(_)
                | BridgeError::HistoryUnavailable(_)
        )
    }
}
