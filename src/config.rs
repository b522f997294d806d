//! Configuration from CLI flags and environment variables.
//!
//! Every flag has an environment fallback so the bridge runs unchanged on
//! container platforms that only inject env vars. A `.env` file is loaded
//! by `main` before parsing.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Default bound on the in-memory message log. Deployed iterations used
/// anywhere from 100 to 1000.
pub const DEFAULT_STORE_CAPACITY: usize = 500;

/// Webhook URL env var aliases, checked in order. Earlier deployments named
/// the variable differently.
const WEBHOOK_ENV_ALIASES: [&str; 3] = ["N8N_WEBHOOK_URL", "N8N_WEBHOOK", "NOTION_WEBHOOK"];

#[derive(Debug, Parser)]
#[command(name = "wabridge", version, about = "WhatsApp → automation webhook bridge")]
pub struct Cli {
    /// Port for the HTTP surface
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Bind address for the HTTP surface
    #[arg(long, env = "BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Webhook URL messages are forwarded to (also: N8N_WEBHOOK, NOTION_WEBHOOK)
    #[arg(long, env = "N8N_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Public URL of this service, used for keep-alive self pings
    #[arg(long, env = "SELF_URL")]
    pub self_url: Option<String>,

    /// Own phone number (digits), used to attribute linked-device echoes
    #[arg(long, env = "OWN_NUMBER")]
    pub own_number: Option<String>,

    /// Maximum number of messages kept in memory (oldest evicted first)
    #[arg(long, env = "STORE_CAPACITY", default_value_t = DEFAULT_STORE_CAPACITY)]
    pub store_capacity: usize,

    /// Directory for the WhatsApp session database
    #[arg(long, env = "WABRIDGE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Number of recent conversations to backfill after connecting
    #[arg(long, env = "BACKFILL_CHATS", default_value_t = 5)]
    pub backfill_chats: usize,

    /// Number of messages fetched per backfilled conversation
    #[arg(long, env = "BACKFILL_MESSAGES", default_value_t = 20)]
    pub backfill_messages: usize,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub webhook_url: Option<String>,
    pub self_url: Option<String>,
    pub own_number: Option<String>,
    pub store_capacity: usize,
    pub data_dir: PathBuf,
    pub backfill_chats: usize,
    pub backfill_messages: usize,
    /// Pause between backfilled conversations, pacing load on the transport.
    pub backfill_delay: Duration,
    /// Wait before rebuilding the connection after it drops.
    pub reconnect_delay: Duration,
    /// Interval between keep-alive self pings.
    pub keepalive_interval: Duration,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        let webhook_url = cli.webhook_url.clone().or_else(webhook_url_from_env);
        let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);

        Self {
            port: cli.port,
            bind: cli.bind.clone(),
            webhook_url,
            self_url: cli.self_url.clone(),
            own_number: cli.own_number.as_deref().map(normalize_number),
            store_capacity: cli.store_capacity.max(1),
            data_dir,
            backfill_chats: cli.backfill_chats,
            backfill_messages: cli.backfill_messages,
            backfill_delay: Duration::from_millis(1000),
            reconnect_delay: Duration::from_secs(3),
            keepalive_interval: Duration::from_secs(14 * 60),
        }
    }

    /// Path of the session credential database.
    pub fn session_db_path(&self) -> PathBuf {
        self.data_dir.join("session.db")
    }

    /// Address string for the HTTP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn webhook_url_from_env() -> Option<String> {
    WEBHOOK_ENV_ALIASES
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|v| !v.is_empty())
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wabridge")
}

/// Strip everything but digits from a phone number.
pub fn normalize_number(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}
