//! Logging initialization
//!
//! Log lines go to stdout; when a log file is configured they are also
//! appended to it, so the file mirrors what an operator sees on the console.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter (e.g., "info", "debug", "trace")
    pub level: String,
    /// Log to this file (append mode) in addition to stdout
    pub log_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Initialize logging. Must be called at most once per process.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let stdout_layer = fmt::layer().with_target(false);

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().append(true).create(true).open(path)?;
            let file_layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file));

            Registry::default()
                .with(filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();
        }
        None => {
            Registry::default().with(filter).with(stdout_layer).init();
        }
    }

    Ok(())
}
