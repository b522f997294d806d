//! wabridge - WhatsApp → Automation Webhook Bridge
//!
//! Connects to a WhatsApp account over the WhatsApp Web protocol, observes
//! incoming and outgoing chat messages, keeps a bounded in-memory log of them,
//! and forwards each accepted message to an external automation webhook (N8n
//! or similar). A small HTTP surface exposes pairing (QR code), status,
//! message/conversation views, and message sending.
//!
//! ## Quick Start
//!
//! ```bash
//! # Point the bridge at an N8n webhook and start it
//! N8N_WEBHOOK_URL=https://n8n.example.com/webhook/crm wabridge --port 3000
//!
//! # Then open http://localhost:3000/qr and scan with your phone
//! ```

pub mod bridge;
pub mod channels;
pub mod config;
pub mod error;
pub mod keepalive;
pub mod logging;
pub mod server;
pub mod webhook;

// Re-export commonly used types
pub use bridge::Bridge;
pub use config::Config;
pub use error::{BridgeError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
