//! Display utilities and configuration loading for the busylight CLI.

use anyhow::{Context, Result};
use busylight_lib::LoadingConfig;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Load the configuration file, or the defaults when none is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<LoadingConfig> {
    match path {
        Some(path) => LoadingConfig::from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(LoadingConfig::default()),
    }
}

/// Create a spinner redrawn at the configured poll interval.
pub(crate) fn spinner(quiet: bool, tick: Duration) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(tick);
    pb
}

/// Format a duration as whole milliseconds.
pub(crate) fn millis(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}

/// Deterministic spread of `count` values over `1..=spread_ms`.
///
/// Stepping by a prime keeps neighbouring operations from having
/// neighbouring durations.
pub(crate) fn spread(index: usize, count: usize, spread_ms: u64) -> Duration {
    let count = count.max(1) as u64;
    let slot = (index as u64).wrapping_mul(7919) % count + 1;
    Duration::from_millis((spread_ms.saturating_mul(slot) / count).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, LoadingConfig::default());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "poll_interval_ms": 50 }}"#).unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_load_config_reports_path() {
        let error = load_config(Some(Path::new("/nonexistent/busylight.json"))).unwrap_err();
        assert!(error.to_string().contains("/nonexistent/busylight.json"));
    }

    #[test]
    fn test_spread_stays_in_range() {
        for index in 0..10 {
            let duration = spread(index, 10, 1000);
            assert!(duration >= Duration::from_millis(100));
            assert!(duration <= Duration::from_millis(1000));
        }
        assert_eq!(spread(0, 0, 0), Duration::from_millis(1));
    }

    #[test]
    fn test_spread_large_values_do_not_overflow() {
        let duration = spread(9, 10, u64::MAX);
        assert!(duration > Duration::ZERO);
        assert!(duration <= Duration::from_millis(u64::MAX));
    }
}
