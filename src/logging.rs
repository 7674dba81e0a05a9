//! Tracing setup: stderr always, plus a daily-rolling file when a log
//! directory is configured.

use std::path::Path;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

use crate::error::ConfigError;

const LOG_FILE_PREFIX: &str = "dot-traffic.log";

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync + 'static>;

/// Filter from `RUST_LOG`, defaulting to `info`.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Build the subscriber without installing it.
fn build(log_dir: Option<&Path>) -> Result<(BoxedSubscriber, Option<WorkerGuard>), ConfigError> {
    let Some(log_dir) = log_dir else {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false));
        return Ok((Box::new(subscriber), None));
    };

    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false));
    Ok((Box::new(subscriber), Some(guard)))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// stops the file writer.
pub fn init(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>, ConfigError> {
    let (subscriber, guard) = build(log_dir)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?;

    if let Some(log_dir) = log_dir {
        tracing::info!(log_dir = %log_dir.display(), "File logging enabled");
    }
    Ok(guard)
}
