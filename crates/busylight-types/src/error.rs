//! Error types for busylight.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while building or loading a [`LoadingConfig`](crate::LoadingConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The poll interval must be positive.
    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,

    /// The minimum display time exceeds the supported maximum.
    #[error("Minimum display time {value_ms}ms exceeds the maximum of {max_ms}ms")]
    MinDisplayTooLong {
        /// The configured value in milliseconds.
        value_ms: u64,
        /// The largest accepted value in milliseconds.
        max_ms: u64,
    },

    /// The namespace separator must not be empty.
    #[error("Namespace separator must not be empty")]
    EmptySeparator,

    /// Failed to read a configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse a configuration file.
    #[error("Failed to parse config file '{path}': {source}")]
    ParseFile {
        /// The path that could not be parsed.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Failed to parse an in-memory configuration document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error returned by bounded waits on the keyed registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The keys were still loading when the timeout elapsed.
    #[error("Timed out after {timeout:?} waiting for {} key(s) to go idle: {}", busy.len(), busy.join(", "))]
    TimedOut {
        /// The timeout that elapsed.
        timeout: Duration,
        /// Keys that were still loading when the timeout elapsed.
        busy: Vec<String>,
    },

    /// The registry was dropped while the wait was outstanding.
    #[error("Registry closed while waiting for keys to go idle")]
    Closed,
}
