//! Logging configuration module
//! Console output plus an optional rolling JSON file

use crate::config::LoggingSettings;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "kubeconfig-relay.log";

/// Initialize the global subscriber
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// flushes the file writer on drop and must be held until exit.
pub fn init(settings: &LoggingSettings) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))?;

    let console_layer = if settings.json {
        fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .json()
            .with_writer(io::stdout)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .with_writer(io::stdout)
            .boxed()
    };

    let guard = if let Some(ref dir) = settings.log_dir {
        let (writer, guard) = non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));

        let file_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_ansi(false)
            .json()
            .with_writer(writer);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init()?;

        None
    };

    tracing::info!("Logging initialized - level: {}", settings.level);

    Ok(guard)
}
