//! Keyed loading registry.
//!
//! Independent regions of an application each own a named flag in one
//! shared [`LoadingRegistry`]. The flags live in a [`watch`] channel, so
//! every update wakes subscribers and [`LoadingRegistry::wait_for_all`]
//! resolves on the update that idles its keys rather than on a poll tick.
//!
//! Observer events are queued while the flag map is locked, so they are
//! delivered in the same order as the updates that caused them.

use crate::{KeySelector, LoadingMap, LoadingObserver, Namespace};
use busylight_types::{ConfigError, LoadingConfig, WaitError};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

struct Inner {
    state: watch::Sender<LoadingMap>,
    separator: String,
    poll_interval: Duration,
    observer: Option<Box<dyn LoadingObserver>>,
    events: Mutex<EventQueue>,
}

/// Observer events waiting for delivery.
#[derive(Debug, Default)]
struct EventQueue {
    pending: VecDeque<(String, bool)>,
    /// Set while some caller is draining `pending`.
    draining: bool,
}

/// Shared map of named loading flags.
///
/// Cloning is cheap; clones share the same flags.
///
/// # Example
///
/// ```
/// use busylight_registry::LoadingRegistry;
///
/// let registry = LoadingRegistry::default();
/// registry.start("table");
/// registry.start("chart");
/// registry.stop("table");
///
/// assert!(registry.is_loading("chart"));
/// assert!(!registry.is_loading("never-set"));
/// assert_eq!(registry.loading_keys(), vec!["chart"]);
/// ```
#[derive(Clone)]
pub struct LoadingRegistry {
    inner: Arc<Inner>,
}

impl fmt::Debug for LoadingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingRegistry")
            .field("flags", &*self.inner.state.borrow())
            .field("separator", &self.inner.separator)
            .field("observer", &self.inner.observer.is_some())
            .finish()
    }
}

/// Builder for a [`LoadingRegistry`] with an observer or initial flags.
#[derive(Default)]
pub struct RegistryBuilder {
    config: LoadingConfig,
    initial: LoadingMap,
    observer: Option<Box<dyn LoadingObserver>>,
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("config", &self.config)
            .field("initial", &self.initial)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl RegistryBuilder {
    /// Uses `config` instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: LoadingConfig) -> Self {
        self.config = config;
        self
    }

    /// Seeds the registry with flags. Seeding does not notify the observer.
    #[must_use]
    pub fn initial_states<I, K>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = (K, bool)>,
        K: AsRef<str>,
    {
        for (key, loading) in states {
            self.initial.set(key.as_ref(), loading);
        }
        self
    }

    /// Registers an observer notified after every flag update.
    #[must_use]
    pub fn observer(mut self, observer: impl LoadingObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn build(self) -> Result<LoadingRegistry, ConfigError> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    /// Builds the registry without validating the configuration.
    fn assemble(self) -> LoadingRegistry {
        let poll_interval = self.config.poll_interval();
        let (state, _) = watch::channel(self.initial);

        LoadingRegistry {
            inner: Arc::new(Inner {
                state,
                separator: self.config.namespace_separator,
                poll_interval,
                observer: self.observer,
                events: Mutex::new(EventQueue::default()),
            }),
        }
    }
}

impl LoadingRegistry {
    /// Creates an empty registry from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(config: &LoadingConfig) -> Result<Self, ConfigError> {
        Self::builder().config(config.clone()).build()
    }

    /// Returns a builder for registries with an observer or initial flags.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Returns the separator placed between namespace prefixes and sub-keys.
    #[must_use]
    pub fn separator(&self) -> &str {
        &self.inner.separator
    }

    /// Returns the configured refresh cadence for renderers.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    /// Sets the flag for `key`, creating the key if needed.
    ///
    /// The observer, if any, is called for every update, even one that
    /// leaves the flag unchanged. An update made from inside the observer
    /// is delivered after the current callback returns.
    pub fn set_loading(&self, key: &str, loading: bool) {
        let changed = self.inner.state.send_if_modified(|map| {
            self.enqueue(key, loading);
            map.set(key, loading)
        });
        if changed {
            debug!(key, loading, "loading flag changed");
        }
        self.dispatch();
    }

    /// Marks `key` as loading.
    pub fn start(&self, key: &str) {
        self.set_loading(key, true);
    }

    /// Marks `key` as idle.
    pub fn stop(&self, key: &str) {
        self.set_loading(key, false);
    }

    /// Flips the flag for `key`. An absent key becomes loading.
    pub fn toggle(&self, key: &str) {
        let mut loading = false;
        self.inner.state.send_if_modified(|map| {
            loading = !map.is_loading(key);
            self.enqueue(key, loading);
            map.set(key, loading)
        });
        debug!(key, loading, "loading flag toggled");
        self.dispatch();
    }

    /// Returns true if `key` is loading. Absent keys are not loading.
    #[must_use]
    pub fn is_loading(&self, key: &str) -> bool {
        self.inner.state.borrow().is_loading(key)
    }

    /// Returns true if any key is loading.
    #[must_use]
    pub fn is_any_loading(&self) -> bool {
        self.inner.state.borrow().any_in(None)
    }

    /// Returns true if there is at least one key and every key is loading.
    #[must_use]
    pub fn is_all_loading(&self) -> bool {
        self.inner.state.borrow().all_in(None)
    }

    /// Returns the number of keys currently loading.
    #[must_use]
    pub fn loading_count(&self) -> usize {
        self.inner.state.borrow().count_in(None)
    }

    /// Returns the keys currently loading, in the order they were first set.
    #[must_use]
    pub fn loading_keys(&self) -> Vec<String> {
        self.inner.state.borrow().keys_in(None)
    }

    /// Returns a copy of every flag.
    #[must_use]
    pub fn snapshot(&self) -> LoadingMap {
        self.inner.state.borrow().clone()
    }

    /// Runs `operation` with `key` marked as loading.
    ///
    /// The flag is cleared on every exit path, including failure and
    /// cancellation, and the operation's result is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the operation's error after clearing the flag.
    pub async fn with_loading<T, E, Fut>(&self, key: &str, operation: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let _guard = self.acquire(key);
        operation.await
    }

    /// Marks `key` as loading and returns a guard that stops it when dropped.
    pub fn acquire(&self, key: &str) -> LoadingGuard {
        self.start(key);
        LoadingGuard {
            registry: self.clone(),
            key: key.to_string(),
        }
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

    /// Marks every key as idle without removing any.
    pub fn reset_all(&self) {
        self.reset_scope(None);
    }

    /// Removes `key`. Afterwards it reads as not loading.
    pub fn clear(&self, key: &str) {
        if self.inner.state.send_if_modified(|map| map.remove(key)) {
            debug!(key, "loading flag cleared");
        }
    }

    /// Removes every key.
    pub fn clear_all(&self) {
        self.clear_scope(None);
    }

    /// Returns a view restricted to keys under `prefix`.
    ///
    /// The view reads and writes `prefix + separator + key` and never sees
    /// keys outside its prefix.
    #[must_use]
    pub fn namespace(&self, prefix: &str) -> Namespace {
        Namespace::new(self.clone(), prefix)
    }

    /// Returns a selector reporting whether any of `keys` is loading.
    #[must_use]
    pub fn selector<I, K>(&self, keys: I) -> KeySelector
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        KeySelector::new(self.subscribe(), keys.into_iter().map(Into::into).collect())
    }

    /// Subscribes to flag updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LoadingMap> {
        self.inner.state.subscribe()
    }

    /// Waits until none of `keys` is loading.
    ///
    /// Resolves without yielding if the keys are already idle; otherwise
    /// resolves on the update that makes the last of them idle. There is no
    /// timeout; see [`wait_for_all_timeout`](Self::wait_for_all_timeout).
    pub async fn wait_for_all<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        self.wait_for_keys(&keys).await;
    }

    /// Waits until none of `keys` is loading, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::TimedOut`] with the keys still loading if the
    /// timeout elapses first.
    pub async fn wait_for_all_timeout<I, K>(
        &self,
        keys: I,
        timeout: Duration,
    ) -> Result<(), WaitError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();

        match tokio::time::timeout(timeout, self.wait_for_keys(&keys)).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let map = self.inner.state.borrow();
                let busy = keys
                    .into_iter()
                    .filter(|key| map.is_loading(key))
                    .collect();
                Err(WaitError::TimedOut { timeout, busy })
            }
        }
    }

    pub(crate) async fn wait_for_keys(&self, keys: &[String]) {
        let mut rx = self.inner.state.subscribe();
        let idle = rx
            .wait_for(|map| keys.iter().all(|key| !map.is_loading(key)))
            .await
            .is_ok();
        trace!(keys = keys.len(), idle, "wait for keys finished");
    }

    pub(crate) fn with_map<R>(&self, f: impl FnOnce(&LoadingMap) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    pub(crate) fn reset_scope(&self, scope: Option<&str>) {
        let mut count = 0;
        self.inner.state.send_if_modified(|map| {
            let reset = map.reset(scope);
            count = reset.len();
            for key in &reset {
                self.enqueue(key, false);
            }
            count > 0
        });

        if count > 0 {
            debug!(count, scope, "loading flags reset");
        }
        self.dispatch();
    }

    pub(crate) fn clear_scope(&self, scope: Option<&str>) {
        let mut removed = 0;
        self.inner.state.send_if_modified(|map| {
            removed = map.clear(scope);
            removed > 0
        });

        if removed > 0 {
            debug!(count = removed, scope, "loading flags cleared");
        }
    }

    fn events(&self) -> MutexGuard<'_, EventQueue> {
        self.inner
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues an observer event. Called with the flag map locked.
    fn enqueue(&self, key: &str, loading: bool) {
        if self.inner.observer.is_some() {
            self.events().pending.push_back((key.to_string(), loading));
        }
    }

    /// Delivers queued events in order, unless another caller already is.
    fn dispatch(&self) {
        let Some(observer) = &self.inner.observer else {
            return;
        };

        {
            let mut events = self.events();
            if events.draining {
                return;
            }
            events.draining = true;
        }
        let _unwind = UnwindGuard(self);

        loop {
            let (key, loading) = {
                let mut events = self.events();
                let Some(event) = events.pending.pop_front() else {
                    // Released under the same lock that saw the queue
                    // empty, so no event is left behind.
                    events.draining = false;
                    return;
                };
                event
            };
            observer.on_loading_change(&key, loading);
        }
    }
}

/// Releases the queue if an observer panics mid-drain.
struct UnwindGuard<'a>(&'a LoadingRegistry);

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut events = self.0.events();
            events.draining = false;
            events.pending.clear();
        }
    }
}

impl Default for LoadingRegistry {
    fn default() -> Self {
        RegistryBuilder::default().assemble()
    }
}

/// Keeps a key marked as loading until dropped.
#[derive(Debug)]
#[must_use = "the key is stopped as soon as the guard is dropped"]
pub struct LoadingGuard {
    registry: LoadingRegistry,
    key: String,
}

impl LoadingGuard {
    /// Returns the full key this guard holds.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.registry.stop(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};
    use tokio::time::{Instant, sleep};

    #[test]
    fn test_unset_key_not_loading() {
        let registry = LoadingRegistry::default();
        assert!(!registry.is_loading("anything"));
    }

    #[test]
    fn test_start_stop() {
        let registry = LoadingRegistry::default();
        registry.start("k");
        assert!(registry.is_loading("k"));
        registry.stop("k");
        assert!(!registry.is_loading("k"));
    }

    #[test]
    fn test_toggle() {
        let registry = LoadingRegistry::default();
        registry.toggle("k");
        assert!(registry.is_loading("k"));
        registry.toggle("k");
        assert!(!registry.is_loading("k"));
    }

    #[test]
    fn test_aggregates_on_empty_registry() {
        let registry = LoadingRegistry::default();
        assert!(!registry.is_any_loading());
        assert!(!registry.is_all_loading());
        assert_eq!(registry.loading_count(), 0);
        assert!(registry.loading_keys().is_empty());
    }

    #[test]
    fn test_aggregates() {
        let registry = LoadingRegistry::default();
        registry.set_loading_batch([("a", true), ("b", true), ("c", false)]);

        assert!(registry.is_any_loading());
        assert!(!registry.is_all_loading());
        assert_eq!(registry.loading_count(), 2);
        assert_eq!(registry.loading_keys(), vec!["a", "b"]);

        registry.start("c");
        assert!(registry.is_all_loading());
    }

    #[test]
    fn test_reset_all_keeps_keys() {
        let registry = LoadingRegistry::default();
        registry.set_loading_batch([("a", true), ("b", true)]);
        registry.reset_all();

        assert!(!registry.is_any_loading());
        assert_eq!(registry.snapshot().len(), 2);
        assert!(!registry.is_all_loading());
    }

    #[test]
    fn test_clear_and_clear_all() {
        let registry = LoadingRegistry::default();
        registry.set_loading_batch([("a", true), ("b", true)]);

        registry.clear("a");
        assert!(!registry.is_loading("a"));
        assert!(!registry.snapshot().contains("a"));
        // Only "b" remains, and it is loading.
        assert!(registry.is_all_loading());

        registry.clear_all();
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = LoadingConfig::default().with_separator("");
        assert!(LoadingRegistry::new(&config).is_err());
    }

    #[test]
    fn test_initial_states() {
        let registry = LoadingRegistry::builder()
            .initial_states([("boot", true), ("idle", false)])
            .build()
            .unwrap();

        assert!(registry.is_loading("boot"));
        assert!(!registry.is_loading("idle"));
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn test_observer_sees_every_update() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let registry = LoadingRegistry::builder()
            .observer(move |key: &str, loading: bool| {
                sink.lock().unwrap().push((key.to_string(), loading));
            })
            .build()
            .unwrap();

        registry.start("a");
        registry.start("a");
        registry.toggle("b");
        registry.reset_all();

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                ("a".to_string(), true),
                ("a".to_string(), true),
                ("b".to_string(), true),
                ("a".to_string(), false),
                ("b".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_observer_may_reenter_registry() {
        let handle: Arc<OnceLock<LoadingRegistry>> = Arc::new(OnceLock::new());
        let counts = Arc::new(Mutex::new(Vec::new()));

        let cell = Arc::clone(&handle);
        let sink = Arc::clone(&counts);
        let registry = LoadingRegistry::builder()
            .observer(move |_: &str, _: bool| {
                if let Some(registry) = cell.get() {
                    sink.lock().unwrap().push(registry.loading_count());
                }
            })
            .build()
            .unwrap();
        handle.set(registry.clone()).unwrap();

        registry.start("x");
        registry.start("y");
        registry.stop("x");
        assert_eq!(*counts.lock().unwrap(), vec![1, 2, 1]);
    }

    #[test]
    fn test_observer_may_update_registry() {
        let handle: Arc<OnceLock<LoadingRegistry>> = Arc::new(OnceLock::new());
        let events = Arc::new(Mutex::new(Vec::new()));

        let cell = Arc::clone(&handle);
        let sink = Arc::clone(&events);
        let registry = LoadingRegistry::builder()
            .observer(move |key: &str, loading: bool| {
                sink.lock().unwrap().push((key.to_string(), loading));
                if key == "parent"
                    && let Some(registry) = cell.get()
                {
                    registry.set_loading("child", loading);
                }
            })
            .build()
            .unwrap();
        handle.set(registry.clone()).unwrap();

        registry.start("parent");
        assert!(registry.is_loading("child"));
        registry.stop("parent");
        assert!(!registry.is_loading("child"));

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                ("parent".to_string(), true),
                ("child".to_string(), true),
                ("parent".to_string(), false),
                ("child".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_observer_order_matches_state_across_threads() {
        for _ in 0..200 {
            let last = Arc::new(Mutex::new(None));
            let sink = Arc::clone(&last);
            let registry = LoadingRegistry::builder()
                .observer(move |_: &str, loading: bool| {
                    std::thread::yield_now();
                    *sink.lock().unwrap() = Some(loading);
                })
                .build()
                .unwrap();

            let starter = registry.clone();
            let stopper = registry.clone();
            let a = std::thread::spawn(move || starter.start("k"));
            let b = std::thread::spawn(move || stopper.stop("k"));
            a.join().unwrap();
            b.join().unwrap();

            assert_eq!(*last.lock().unwrap(), Some(registry.is_loading("k")));
        }
    }

    #[test]
    fn test_default_matches_default_config() {
        let registry = LoadingRegistry::default();
        let config = LoadingConfig::default();
        assert_eq!(registry.separator(), config.namespace_separator);
        assert_eq!(registry.poll_interval(), config.poll_interval());

        let custom = LoadingConfig {
            poll_interval_ms: 40,
            ..LoadingConfig::default()
        }
        .with_separator("/");
        let registry = LoadingRegistry::new(&custom).unwrap();
        assert_eq!(registry.separator(), "/");
        assert_eq!(registry.poll_interval(), Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_with_loading_success() {
        let registry = LoadingRegistry::default();
        let probe = registry.clone();

        let value = registry
            .with_loading("save", async {
                assert!(probe.is_loading("save"));
                Ok::<_, String>(42)
            })
            .await;

        assert_eq!(value, Ok(42));
        assert!(!registry.is_loading("save"));
    }

    #[tokio::test]
    async fn test_with_loading_failure_propagates() {
        let registry = LoadingRegistry::default();

        let result: Result<(), String> = registry
            .with_loading("save", async { Err("disk full".to_string()) })
            .await;

        assert_eq!(result, Err("disk full".to_string()));
        assert!(!registry.is_loading("save"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_loading_cancelled() {
        let registry = LoadingRegistry::default();

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            registry.with_loading("slow", async {
                sleep(Duration::from_secs(10)).await;
                Ok::<_, String>(())
            }),
        )
        .await;

        assert!(outcome.is_err());
        assert!(!registry.is_loading("slow"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_all_already_idle() {
        let registry = LoadingRegistry::default();
        registry.stop("x");

        let start = Instant::now();
        registry.wait_for_all(["x", "y"]).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_all_waits_for_every_key() {
        let registry = LoadingRegistry::default();
        registry.start("x");
        registry.start("y");

        let worker = registry.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            worker.stop("x");
            sleep(Duration::from_millis(100)).await;
            worker.stop("y");
        });

        let start = Instant::now();
        registry.wait_for_all(["x", "y"]).await;

        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(!registry.is_loading("x"));
        assert!(!registry.is_loading("y"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_all_timeout() {
        let registry = LoadingRegistry::default();
        registry.set_loading_batch([("x", true), ("y", false)]);

        let result = registry
            .wait_for_all_timeout(["x", "y"], Duration::from_millis(300))
            .await;

        assert_eq!(
            result,
            Err(WaitError::TimedOut {
                timeout: Duration::from_millis(300),
                busy: vec!["x".to_string()],
            })
        );

        registry.stop("x");
        let result = registry
            .wait_for_all_timeout(["x", "y"], Duration::from_millis(300))
            .await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_keys_multi_thread() {
        let registry = LoadingRegistry::default();
        let mut handles = Vec::new();

        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("task-{i}");
                registry
                    .with_loading(&key, async {
                        tokio::task::yield_now().await;
                        Ok::<_, String>(i)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(registry.loading_count(), 0);
        assert_eq!(registry.snapshot().len(), 16);
    }
}
