use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use wabridge::bridge::Bridge;
use wabridge::channels::whatsapp::history::HistorySource;
use wabridge::channels::whatsapp::{BridgeChannel, ConnectionState};
use wabridge::config::{Cli, Config};
use wabridge::logging::{init_logging, LogConfig};
use wabridge::server::{self, AppState};
use wabridge::webhook::WebhookSink;
use wabridge::{keepalive, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = init_logging(LogConfig::new().with_debug_mode(cli.debug))?;
    tracing::info!("wabridge v{VERSION} starting");

    let config = Config::from_cli(&cli);
    if config.webhook_url.is_none() {
        tracing::warn!("no webhook URL configured, messages will only be kept in memory");
    }

    let bridge = Arc::new(Bridge::new(config.store_capacity));
    let conn = Arc::new(ConnectionState::new(config.own_number.clone()));
    let webhook = WebhookSink::new(config.webhook_url.clone());

    // The transport offers no on-demand history fetch; backfill and the
    // history endpoint stay off until a source exists for this transport.
    let history: Option<Arc<dyn HistorySource>> = None;

    let channel = BridgeChannel::new(
        bridge.clone(),
        conn.clone(),
        webhook.clone(),
        history.clone(),
        config.clone(),
    );
    let _channel_task = channel.start();

    keepalive::spawn(config.self_url.clone(), config.keepalive_interval);

    let state = AppState {
        bridge,
        conn,
        webhook,
        history,
        config: Arc::new(config),
        started_at: Instant::now(),
    };
    server::serve(state).await?;
    Ok(())
}
