//! Prefix-scoped views over the keyed registry.

use crate::{KeySelector, LoadingGuard, LoadingRegistry};
use busylight_types::WaitError;
use std::future::Future;
use std::time::Duration;

/// A view of a [`LoadingRegistry`] restricted to one key prefix.
///
/// Every key passed to a namespace is stored as `prefix + separator + key`.
/// Aggregates, resets and clears only see keys under the prefix, so
/// independent modules can share one registry without colliding.
///
/// ```
/// use busylight_registry::LoadingRegistry;
///
/// let registry = LoadingRegistry::default();
/// let users = registry.namespace("users");
///
/// users.start("list");
/// assert!(registry.is_loading("users:list"));
/// assert!(!registry.is_loading("list"));
/// assert_eq!(users.loading_keys(), vec!["list"]);
/// ```
#[derive(Debug, Clone)]
pub struct Namespace {
    registry: LoadingRegistry,
    prefix: String,
    /// `prefix + separator`, the start of every key in this namespace.
    scope: String,
}

impl Namespace {
    pub(crate) fn new(registry: LoadingRegistry, prefix: &str) -> Self {
        let scope = format!("{prefix}{}", registry.separator());
        Self {
            registry,
            prefix: prefix.to_string(),
            scope,
        }
    }

    /// Returns the namespace prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the registry this namespace views.
    #[must_use]
    pub const fn registry(&self) -> &LoadingRegistry {
        &self.registry
    }

    /// Returns the registry key for `key`.
    #[must_use]
    pub fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.scope)
    }

    /// Returns a namespace nested under this one.
    ///
    /// With the default separator, `registry.namespace("a").namespace("b")`
    /// stores keys as `a:b:key`.
    #[must_use]
    pub fn namespace(&self, prefix: &str) -> Self {
        Self::new(self.registry.clone(), &self.full_key(prefix))
    }

    /// Sets the flag for `key`.
    pub fn set_loading(&self, key: &str, loading: bool) {
        self.registry.set_loading(&self.full_key(key), loading);
    }

    /// Marks `key` as loading.
    pub fn start(&self, key: &str) {
        self.registry.start(&self.full_key(key));
    }

    /// Marks `key` as idle.
    pub fn stop(&self, key: &str) {
        self.registry.stop(&self.full_key(key));
    }

    /// Flips the flag for `key`.
    pub fn toggle(&self, key: &str) {
        self.registry.toggle(&self.full_key(key));
    }

    /// Returns true if `key` is loading.
    #[must_use]
    pub fn is_loading(&self, key: &str) -> bool {
        self.registry.is_loading(&self.full_key(key))
    }

    /// Returns true if any key in this namespace is loading.
    #[must_use]
    pub fn is_any_loading(&self) -> bool {
        self.registry.with_map(|map| map.any_in(Some(self.scope.as_str())))
    }

    /// Returns true if this namespace has keys and all of them are loading.
    #[must_use]
    pub fn is_all_loading(&self) -> bool {
        self.registry.with_map(|map| map.all_in(Some(self.scope.as_str())))
    }

    /// Returns the number of keys in this namespace currently loading.
    #[must_use]
    pub fn loading_count(&self) -> usize {
        self.registry.with_map(|map| map.count_in(Some(self.scope.as_str())))
    }

    /// Returns the sub-keys currently loading, without the prefix.
    #[must_use]
    pub fn loading_keys(&self) -> Vec<String> {
        self.registry.with_map(|map| {
            map.keys_in(Some(self.scope.as_str()))
                .into_iter()
                .filter_map(|key| key.strip_prefix(&self.scope).map(str::to_string))
                .collect()
        })
    }

    /// Runs `operation` with `key` marked as loading, propagating its result.
    ///
    /// # Errors
    ///
    /// Returns the operation's error after clearing the flag.
    pub async fn with_loading<T, E, Fut>(&self, key: &str, operation: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        self.registry.with_loading(&self.full_key(key), operation).await
    }

    /// Marks `key` as loading until the returned guard is dropped.
    pub fn acquire(&self, key: &str) -> LoadingGuard {
        self.registry.acquire(&self.full_key(key))
    }

    /// Applies several updates in order.
    pub fn set_loading_batch<I, K>(&self, states: I)
    where
        I: IntoIterator<Item = (K, bool)>,
        K: AsRef<str>,
    {
        for (key, loading) in states {
            self.set_loading(key.as_ref(), loading);
        }
    }

    /// Marks every key in this namespace as idle.
    pub fn reset_all(&self) {
        self.registry.reset_scope(Some(self.scope.as_str()));
    }

    /// Removes `key` from the registry.
    pub fn clear(&self, key: &str) {
        self.registry.clear(&self.full_key(key));
    }

    /// Removes every key in this namespace.
    pub fn clear_all(&self) {
        self.registry.clear_scope(Some(self.scope.as_str()));
    }

    /// Returns a selector over sub-keys of this namespace.
    #[must_use]
    pub fn selector<I, K>(&self, keys: I) -> KeySelector
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.registry
            .selector(keys.into_iter().map(|key| self.full_key(key.as_ref())))
    }

    /// Waits until none of `keys` in this namespace is loading.
    pub async fn wait_for_all<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys: Vec<String> = self.translate(keys);
        self.registry.wait_for_keys(&keys).await;
    }

    /// Waits until none of `keys` is loading, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::TimedOut`] naming the full registry keys still
    /// loading when the timeout elapses.
    pub async fn wait_for_all_timeout<I, K>(
        &self,
        keys: I,
        timeout: Duration,
    ) -> Result<(), WaitError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys: Vec<String> = self.translate(keys);
        self.registry.wait_for_all_timeout(keys, timeout).await
    }

    fn translate<I, K>(&self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter()
            .map(|key| self.full_key(key.as_ref()))
            .collect()
    }
}
