// Tracing setup: stdout plus a daily-rolling file under ~/.writr/logs

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::models::Settings;
use crate::storage;

/// Environment variable overriding the configured log filter
pub const LOG_ENV: &str = "WRITR_LOG";

/// Keeps the file writer flushing; drop it only at exit.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    log_dir: PathBuf,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

fn filter_for(settings: &Settings) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new(crate::models::config::DEFAULT_LOG_FILTER))
}

/// Install the global subscriber. Returns `None` when the log directory
/// cannot be created or a subscriber is already installed.
pub fn init(settings: &Settings) -> Option<LoggingGuard> {
    let log_dir = storage::log_dir()
        .ok()
        .and_then(|dir| std::fs::create_dir_all(&dir).ok().map(|()| dir))
        .or_else(|| {
            let dir = std::env::temp_dir().join("writr").join("logs");
            std::fs::create_dir_all(&dir).ok().map(|()| dir)
        })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "writr.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(filter_for(settings))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        );

    if subscriber.try_init().is_err() {
        return None;
    }

    tracing::info!(log_dir = %log_dir.display(), "tracing initialized");
    Some(LoggingGuard {
        _guard: guard,
        log_dir,
    })
}
