//! Logging initialization.
//!
//! Console logging via `tracing-subscriber` with an `EnvFilter`; the
//! `--debug` flag widens the default filter. An optional rolling file log
//! can be enabled by pointing `log_dir` somewhere — the returned guard must
//! be held for the lifetime of the process or buffered lines are lost.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration, built from CLI flags and environment.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    debug: bool,
    log_dir: Option<PathBuf>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug_mode(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = Some(dir);
        self
    }

    fn default_filter(&self) -> &'static str {
        if self.debug {
            "wabridge=debug,whatsapp_rust=info"
        } else {
            "wabridge=info,whatsapp_rust=warn"
        }
    }
}

/// Initialize the global subscriber. Returns a worker guard when file
/// logging is active; the caller keeps it alive.
pub fn init_logging(config: LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter()));

    let console = fmt::layer().with_target(false);

    match config.log_dir {
        Some(ref dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "wabridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_ansi(false).with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
            Ok(None)
        }
    }
}
