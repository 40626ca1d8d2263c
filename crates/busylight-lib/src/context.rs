//! One configuration, both primitives.

use busylight_indicator::Indicator;
use busylight_registry::LoadingRegistry;
use busylight_types::{LoadingConfig, Result};
use std::path::Path;

/// An [`Indicator`] and a [`LoadingRegistry`] built from the same
/// [`LoadingConfig`].
///
/// Applications construct one context at start-up and hand clones of its
/// handles to the components that report work.
#[derive(Debug, Clone)]
pub struct LoadingContext {
    config: LoadingConfig,
    indicator: Indicator,
    registry: LoadingRegistry,
}

impl LoadingContext {
    /// Builds both primitives from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(config: LoadingConfig) -> Result<Self> {
        let indicator = Indicator::new(&config)?;
        let registry = LoadingRegistry::new(&config)?;
        Ok(Self {
            config,
            indicator,
            registry,
        })
    }

    /// Builds both primitives from a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(LoadingConfig::from_path(path)?)
    }

    /// Returns the configuration both primitives were built from.
    #[must_use]
    pub const fn config(&self) -> &LoadingConfig {
        &self.config
    }

    /// Returns the shared indicator.
    #[must_use]
    pub const fn indicator(&self) -> &Indicator {
        &self.indicator
    }

    /// Returns the shared registry.
    #[must_use]
    pub const fn registry(&self) -> &LoadingRegistry {
        &self.registry
    }
}

impl Default for LoadingContext {
    fn default() -> Self {
        Self {
            config: LoadingConfig::default(),
            indicator: Indicator::default(),
            registry: LoadingRegistry::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use busylight_types::ConfigError;
    use std::time::Duration;

    #[test]
    fn test_context_shares_config() {
        let config = LoadingConfig::default()
            .with_min_display_time(Duration::from_millis(250))
            .with_separator("/");
        let context = LoadingContext::new(config).unwrap();

        assert_eq!(
            context.indicator().min_display_time(),
            Duration::from_millis(250)
        );
        assert_eq!(context.registry().separator(), "/");
        assert_eq!(context.config().min_display_time_ms, 250);
    }

    #[test]
    fn test_context_rejects_invalid_config() {
        let config = LoadingConfig {
            poll_interval_ms: 0,
            ..LoadingConfig::default()
        };
        assert!(matches!(
            LoadingContext::new(config),
            Err(ConfigError::ZeroPollInterval)
        ));
    }

    #[test]
    fn test_clones_share_state() {
        let context = LoadingContext::default();
        let other = context.clone();

        other.registry().start("a");
        other.indicator().show(None);
        assert!(context.registry().is_loading("a"));
        assert!(context.indicator().is_visible());
    }
}
