use anyhow::{anyhow, Context};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use super::alerts::AdminAlertLayer;
use crate::config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

const LOG_FILE_NAME: &str = "lot-watcher.log";

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured filter.
///
/// The returned guard flushes the file writer and must live until exit.
pub fn init_tracing(
    config: &LoggingConfig,
    alerts: Option<AdminAlertLayer>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => parse_filter(&directives)?,
        _ => parse_filter(&config.filter)?,
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(if config.json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    });

    let mut guard = None;
    if let Some(directory) = &config.directory {
        let directory = Path::new(directory);
        std::fs::create_dir_all(directory)
            .with_context(|| format!("failed to create log directory: {}", directory.display()))?;

        let (writer, file_guard) = tracing_appender::non_blocking(rolling::daily(directory, LOG_FILE_NAME));
        layers.push(if config.json {
            fmt::layer().json().with_writer(writer).boxed()
        } else {
            fmt::layer().with_ansi(false).with_writer(writer).boxed()
        });
        guard = Some(file_guard);
    }

    if let Some(alerts) = alerts {
        layers.push(alerts.boxed());
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|e| anyhow!("tracing setup failed: {e}"))?;

    Ok(guard)
}

pub fn parse_filter(directives: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(directives).with_context(|| format!("invalid log filter '{}'", directives))
}
