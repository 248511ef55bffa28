//! Tracing setup, in two phases: a basic stderr subscriber while the
//! configuration loads, then the configured one.

use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LogOutput, LoggingConfig};

/// Phase 1: thread-local subscriber, replaced once config is known.
pub fn init_tracing_basic() -> tracing::subscriber::DefaultGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_default(subscriber)
}

/// Phase 2: global subscriber honoring the logging config.
/// `RUST_LOG` wins over the configured level.
pub fn init_tracing_from_config(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let json = config.format == LogFormat::Json;

    match &config.output {
        LogOutput::Stderr => {
            let layer = fmt::layer().with_target(true).with_writer(std::io::stderr);
            if json {
                tracing_subscriber::registry().with(filter).with(layer.json()).init();
            } else {
                tracing_subscriber::registry().with(filter).with(layer).init();
            }
        }
        LogOutput::Stdout => {
            let layer = fmt::layer().with_target(true);
            if json {
                tracing_subscriber::registry().with(filter).with(layer.json()).init();
            } else {
                tracing_subscriber::registry().with(filter).with(layer).init();
            }
        }
        LogOutput::File { path } => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file '{}'", path))?;
            let layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Arc::new(file));
            if json {
                tracing_subscriber::registry().with(filter).with(layer.json()).init();
            } else {
                tracing_subscriber::registry().with(filter).with(layer).init();
            }
        }
    }

    Ok(())
}
