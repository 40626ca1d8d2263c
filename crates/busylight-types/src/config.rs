//! Loading-state configuration.

use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration shared by the indicator and the keyed registry.
///
/// Every field has a default, so a configuration file only needs to list
/// the values it overrides:
///
/// ```
/// use busylight_types::LoadingConfig;
///
/// let config = LoadingConfig::from_json_str(r#"{ "min_display_time_ms": 250 }"#).unwrap();
/// assert_eq!(config.min_display_time_ms, 250);
/// assert_eq!(config.namespace_separator, ":");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadingConfig {
    /// Minimum time the indicator stays visible after it appears (in milliseconds).
    pub min_display_time_ms: u64,
    /// Refresh cadence for renderers following loading state (in milliseconds).
    pub poll_interval_ms: u64,
    /// Separator placed between a namespace prefix and its sub-key.
    pub namespace_separator: String,
    /// Label shown when `show` is called without text.
    pub default_text: String,
}

impl LoadingConfig {
    /// Default minimum display time (1 second).
    pub const DEFAULT_MIN_DISPLAY_TIME_MS: u64 = 1_000;

    /// Default poll interval (100 milliseconds).
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

    /// Default namespace separator.
    pub const DEFAULT_NAMESPACE_SEPARATOR: &'static str = ":";

    /// Default indicator label.
    pub const DEFAULT_TEXT: &'static str = "Loading...";

    /// Largest accepted minimum display time (10 minutes).
    pub const MAX_MIN_DISPLAY_TIME_MS: u64 = 600_000;

    /// Checks that every option holds a usable value.
    ///
    /// # Errors
    ///
    /// Returns an error if the poll interval is zero, the minimum display
    /// time is above [`Self::MAX_MIN_DISPLAY_TIME_MS`], or the separator is empty.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.min_display_time_ms > Self::MAX_MIN_DISPLAY_TIME_MS {
            return Err(ConfigError::MinDisplayTooLong {
                value_ms: self.min_display_time_ms,
                max_ms: Self::MAX_MIN_DISPLAY_TIME_MS,
            });
        }
        if self.namespace_separator.is_empty() {
            return Err(ConfigError::EmptySeparator);
        }
        Ok(())
    }

    /// Parses and validates a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON, names an unknown
    /// option, or fails [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// [`validate`](Self::validate).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the minimum display time as a [`Duration`].
    #[must_use]
    pub const fn min_display_time(&self) -> Duration {
        Duration::from_millis(self.min_display_time_ms)
    }

    /// Returns the poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Sets the minimum display time.
    #[must_use]
    pub fn with_min_display_time(mut self, duration: Duration) -> Self {
        self.min_display_time_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the namespace separator.
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.namespace_separator = separator.into();
        self
    }
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            min_display_time_ms: Self::DEFAULT_MIN_DISPLAY_TIME_MS,
            poll_interval_ms: Self::DEFAULT_POLL_INTERVAL_MS,
            namespace_separator: Self::DEFAULT_NAMESPACE_SEPARATOR.to_string(),
            default_text: Self::DEFAULT_TEXT.to_string(),
        }
    }
}
