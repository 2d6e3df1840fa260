//! Logging setup.
//!
//! Installs a global `tracing` subscriber: a console layer on stderr and, when
//! configured, a non-blocking file layer. `RUST_LOG` takes precedence over the
//! configured level.
//!
//! # Example
//!
//! ```ignore
//! let _guard = routekeeper::logging::init_logging(&config.logging)?;
//! // Keep `_guard` alive until exit so buffered file output is flushed.
//! ```

use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LoggingConfig;

/// Errors from logging setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {directive:?}: {message}")]
    InvalidFilter { directive: String, message: String },

    #[error("failed to create log directory {path}: {message}")]
    CreateDir { path: String, message: String },

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Build the level filter: `RUST_LOG` if set, otherwise `config.level`.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| LoggingError::InvalidFilter {
        directive: config.level.clone(),
        message: e.to_string(),
    })
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when a log file is configured; dropping it
/// flushes and closes the file.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = build_filter(config)?;
    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let Some(path) = config.file.as_deref() else {
        Registry::default()
            .with(filter)
            .with(console)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        return Ok(None);
    };

    let (directory, file_name) = split_log_path(path);
    std::fs::create_dir_all(directory).map_err(|e| LoggingError::CreateDir {
        path: directory.display().to_string(),
        message: e.to_string(),
    })?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = fmt::layer().with_writer(writer).with_ansi(false);

    Registry::default()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(Some(guard))
}

/// Directory and file name of a log path. A bare file name logs to the current
/// directory.
fn split_log_path(path: &Path) -> (&Path, &std::ffi::OsStr) {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("routekeeper.log"));
    (directory, file_name)
}
