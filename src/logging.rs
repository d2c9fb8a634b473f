//! Tracing subscriber setup.
//!
//! A terminal UI cannot share its screen with log lines, so callers pick a
//! [`LogTarget`]: `Stderr` for headless commands, `Quiet` for the TUI. A
//! configured log file is written to in both cases.

use crate::config::{LogFormat, LoggingConfig};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// Where terminal log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Log to stderr.
    Stderr,
    /// No terminal output; only the configured file, if any.
    Quiet,
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The level directive did not parse.
    #[error("invalid log level '{level}': {source}")]
    Filter {
        level: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    /// The log file could not be opened for appending.
    #[error("cannot open log file '{path}': {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber is already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

fn fmt_layer<S, W>(format: LogFormat, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_thread_names(true);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

/// Build the filter: `RUST_LOG` when set, else the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|source| LoggingError::Filter {
        level: config.level.clone(),
        source,
    })
}

/// Install the global subscriber.
///
/// Does nothing when `target` is `Quiet` and no file is configured.
pub fn init(config: &LoggingConfig, target: LogTarget) -> Result<(), LoggingError> {
    let filter = env_filter(config)?;

    let file = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File {
                    path: path.clone(),
                    source,
                })?;
            Some(file)
        }
        None => None,
    };

    if target == LogTarget::Quiet && file.is_none() {
        return Ok(());
    }

    let stderr_layer = match target {
        LogTarget::Stderr => Some(fmt_layer(config.format, std::io::stderr, true)),
        LogTarget::Quiet => None,
    };
    let file_layer = file.map(|f| fmt_layer(config.format, Mutex::new(f), false));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    debug!(format = %config.format, file = ?config.file, "logging initialized");
    Ok(())
}
