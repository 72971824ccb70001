//! Tracing setup for processes embedding Fleetplane

use crate::config::{LogFormat, LoggingConfig};
use anyhow::Context;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Overrides the configured level when set.
pub const LOG_ENV: &str = "FLEETPLANE_LOG";

/// `FLEETPLANE_LOG` if set and valid, otherwise the configured level,
/// otherwise `info`.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }
    EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// When logging to a file the writes go through a background worker; keep
/// the returned guard alive for as long as logs should be flushed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = build_filter(config);

    let (writer, guard) = match &config.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Log file {} has no file name", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_writer(writer))
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(config.file.is_none())
                    .with_writer(writer),
            )
            .try_init(),
    };
    installed.context("A global tracing subscriber is already installed")?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_falls_back_to_info() {
        let config = LoggingConfig {
            level: "fleetplane=loud".into(),
            ..LoggingConfig::default()
        };
        if std::env::var(LOG_ENV).is_err() {
            assert_eq!(build_filter(&config).to_string(), "info");
        }
    }
}
