//! Combined "any of these keys" views.

use crate::LoadingMap;
use busylight_types::WaitError;
use tokio::sync::watch;

/// Tracks whether any of a fixed set of keys is loading.
///
/// Useful for a control that depends on several independent operations,
/// such as a submit button disabled while either validation or upload runs.
#[derive(Debug, Clone)]
pub struct KeySelector {
    rx: watch::Receiver<LoadingMap>,
    keys: Vec<String>,
    last: bool,
}

impl KeySelector {
    pub(crate) fn new(rx: watch::Receiver<LoadingMap>, keys: Vec<String>) -> Self {
        let last = any_loading(&rx.borrow(), &keys);
        Self { rx, keys, last }
    }

    /// Returns the keys this selector watches.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Returns true if any watched key is loading right now.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        any_loading(&self.rx.borrow(), &self.keys)
    }

    /// Waits until the combined value differs from the last one reported,
    /// then returns the new value.
    ///
    /// Updates to unrelated keys, or updates that leave the combined value
    /// unchanged, do not wake the caller.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Closed`] if the registry has been dropped.
    pub async fn changed(&mut self) -> Result<bool, WaitError> {
        loop {
            self.rx.changed().await.map_err(|_| WaitError::Closed)?;
            let current = any_loading(&self.rx.borrow_and_update(), &self.keys);
            if current != self.last {
                self.last = current;
                return Ok(current);
            }
        }
    }
}

fn any_loading(map: &LoadingMap, keys: &[String]) -> bool {
    keys.iter().any(|key| map.is_loading(key))
}

#[cfg(test)]
mod tests {
    use crate::LoadingRegistry;
    use busylight_types::WaitError;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[test]
    fn test_selector_reflects_any_key() {
        let registry = LoadingRegistry::default();
        let selector = registry.selector(["validate", "upload"]);
        assert!(!selector.is_loading());

        registry.start("upload");
        assert!(selector.is_loading());

        registry.start("unrelated");
        registry.stop("upload");
        assert!(!selector.is_loading());
        assert_eq!(selector.keys(), ["validate", "upload"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_skips_irrelevant_updates() {
        let registry = LoadingRegistry::default();
        let mut selector = registry.selector(["a", "b"]);

        let driver = registry.clone();
        tokio::spawn(async move {
            driver.start("unrelated");
            sleep(Duration::from_millis(10)).await;
            driver.start("a");
            sleep(Duration::from_millis(10)).await;
            // Still busy through "a": no change reported for this one.
            driver.start("b");
            sleep(Duration::from_millis(10)).await;
            driver.stop("a");
            driver.stop("b");
        });

        assert_eq!(selector.changed().await, Ok(true));
        assert_eq!(selector.changed().await, Ok(false));
        assert!(
            timeout(Duration::from_millis(100), selector.changed())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_namespace_selector() {
        let registry = LoadingRegistry::default();
        let form = registry.namespace("form");
        let selector = form.selector(["submit"]);

        registry.start("submit");
        assert!(!selector.is_loading());
        form.start("submit");
        assert!(selector.is_loading());
    }

    #[tokio::test]
    async fn test_changed_after_registry_dropped() {
        let registry = LoadingRegistry::default();
        let mut selector = registry.selector(["a"]);
        drop(registry);

        assert_eq!(selector.changed().await, Err(WaitError::Closed));
    }
}
