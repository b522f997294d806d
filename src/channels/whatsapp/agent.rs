//! WhatsApp connection lifecycle.
//!
//! [`BridgeChannel`] owns the bot: it builds the client against the session
//! store, dispatches events into the pipeline, and keeps reconnecting on a
//! fixed delay until the account logs the device out.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use wacore::types::events::Event;
use whatsapp_rust::bot::Bot;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

use super::history::{self, HistorySource};
use super::session_store::SessionStore;
use super::{handler, ConnectionState};
use crate::bridge::Bridge;
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::webhook::WebhookSink;

pub struct BridgeChannel {
    bridge: Arc<Bridge>,
    state: Arc<ConnectionState>,
    sink: WebhookSink,
    history: Option<Arc<dyn HistorySource>>,
    config: Config,
}

impl BridgeChannel {
    pub fn new(
        bridge: Arc<Bridge>,
        state: Arc<ConnectionState>,
        sink: WebhookSink,
        history: Option<Arc<dyn HistorySource>>,
        config: Config,
    ) -> Self {
        Self {
            bridge,
            state,
            sink,
            history,
            config,
        }
    }

    /// Start as a background task. Returns when the account logs this device
    /// out; every other exit path reconnects after a fixed delay.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = std::fs::create_dir_all(&self.config.data_dir) {
                tracing::error!(
                    "cannot create data dir {}: {e}",
                    self.config.data_dir.display()
                );
                return;
            }
            let db_path = self.config.session_db_path();
            let delay = self.config.reconnect_delay;

            loop {
                let logged_out = Arc::new(AtomicBool::new(false));
                match self.connect_once(&db_path, logged_out.clone()).await {
                    Ok(()) if logged_out.load(Ordering::SeqCst) => {
                        tracing::error!(
                            "device logged out; delete {} and restart to re-pair",
                            db_path.display()
                        );
                        self.state.set_disconnected().await;
                        return;
                    }
                    Ok(()) => {
                        tracing::warn!("connection closed, reconnecting in {delay:?}");
                    }
                    Err(e) => {
                        tracing::error!("connection failed: {e}, retrying in {delay:?}");
                    }
                }
                self.state.set_disconnected().await;
                tokio::time::sleep(delay).await;
            }
        })
    }

    /// One connection attempt: build the bot, run it to completion.
    async fn connect_once(&self, db_path: &Path, logged_out: Arc<AtomicBool>) -> Result<()> {
        let backend = SessionStore::open(db_path.to_string_lossy().as_ref())
            .await
            .map_err(|e| BridgeError::Transport(format!("session store: {e}")))?;

        match backend.has_paired_device().await {
            Ok(true) => tracing::info!("paired session found, reconnecting"),
            Ok(false) => tracing::info!("no paired session, open /qr to pair"),
            Err(e) => tracing::warn!("couldn't check pairing state: {e}"),
        }

        let state = self.state.clone();
        let bridge = self.bridge.clone();
        let sink = self.sink.clone();
        let history_source = self.history.clone();
        let backfill_chats = self.config.backfill_chats;
        let backfill_messages = self.config.backfill_messages;
        let backfill_delay = self.config.backfill_delay;
        // One backfill per connection, kicked on the first Connected event.
        let backfill_started = Arc::new(AtomicBool::new(false));

        let mut bot = Bot::builder()
            .with_backend(Arc::new(backend))
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .on_event(move |event, client| {
                let state = state.clone();
                let bridge = bridge.clone();
                let sink = sink.clone();
                let history_source = history_source.clone();
                let backfill_started = backfill_started.clone();
                let logged_out = logged_out.clone();
                async move {
                    match event {
                        Event::PairingQrCode { code, .. } => {
                            tracing::info!("QR code available, open /qr to pair");
                            state.set_qr(code).await;
                        }
                        Event::Connected(_) => {
                            tracing::info!("connected");
                            state.set_connected(client.clone()).await;
                            if let Some(source) = history_source {
                                if !backfill_started.swap(true, Ordering::SeqCst) {
                                    history::spawn_backfill(
                                        source,
                                        bridge.clone(),
                                        state.own_id().await,
                                        backfill_chats,
                                        backfill_messages,
                                        backfill_delay,
                                    );
                                }
                            }
                        }
                        Event::PairSuccess(_) => {
                            tracing::info!("pairing successful");
                        }
                        Event::Message(msg, info) => {
                            handler::handle_message(&msg, &info, &state, &bridge, &sink).await;
                        }
                        Event::LoggedOut(_) => {
                            tracing::warn!("logged out by the account");
                            logged_out.store(true, Ordering::SeqCst);
                            state.set_disconnected().await;
                        }
                        Event::Disconnected(_) => {
                            tracing::warn!("disconnected");
                            state.set_disconnected().await;
                        }
                        other => {
                            tracing::debug!("unhandled event: {other:?}");
                        }
                    }
                }
            })
            .build()
            .await
            .map_err(|e| BridgeError::Transport(format!("bot build: {e}")))?;

        let handle = bot
            .run()
            .await
            .map_err(|e| BridgeError::Transport(format!("bot run: {e}")))?;
        handle
            .await
            .map_err(|e| BridgeError::Transport(format!("bot task: {e}")))?;
        Ok(())
    }
}
