//! Tracing setup: compact output on stderr, mirrored to a rolling file in
//! `logging.log-dir` when one is configured.

use std::fs;

use anyhow::{Context, Result};
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogRotation, LoggingConfig};

/// Log files are named `main.<date>.log`.
pub const LOG_FILE_PREFIX: &str = "main";

/// Filter used when `RUST_LOG` is unset: `-v` beats the configured level.
pub fn default_level(verbosity: u8, configured: Option<&str>) -> String {
    match verbosity {
        0 => configured
            .map(str::trim)
            .filter(|level| !level.is_empty())
            .unwrap_or("info")
            .to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn rotation(value: LogRotation) -> Rotation {
    match value {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

/// Open the rolling log file, or `None` when file logging is disabled.
pub fn file_appender(config: &LoggingConfig) -> Result<Option<RollingFileAppender>> {
    let Some(dir) = config.log_dir.as_deref() else {
        return Ok(None);
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log dir at {}", dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(rotation(config.rotation))
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(config.max_files)
        .build(dir)
        .with_context(|| format!("failed to open log file in {}", dir.display()))?;
    Ok(Some(appender))
}

/// Install the global subscriber. `config` is `None` before a configuration
/// exists; a log file that cannot be opened only costs the file output.
pub fn init(verbosity: u8, config: Option<&LoggingConfig>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = default_level(verbosity, config.map(|c| c.level.as_str()));
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    let (file, file_error) = match config.map(file_appender) {
        Some(Ok(appender)) => (appender, None),
        Some(Err(err)) => (None, Some(err)),
        None => (None, None),
    };
    let file_layer = file.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    if let Some(err) = file_error {
        warn!(error = %format!("{err:#}"), "file logging disabled");
    }
}
