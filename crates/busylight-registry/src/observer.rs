//! Change observers for the keyed registry.

/// Notified after every flag update on a [`LoadingRegistry`](crate::LoadingRegistry).
///
/// Called outside the registry's internal lock, so observers may read or
/// update the registry. Any `Fn(&str, bool)` closure is an observer.
pub trait LoadingObserver: Send + Sync {
    /// Called with the full key and its new flag.
    fn on_loading_change(&self, key: &str, loading: bool);
}

impl<F> LoadingObserver for F
where
    F: Fn(&str, bool) + Send + Sync,
{
    fn on_loading_change(&self, key: &str, loading: bool) {
        self(key, loading);
    }
}
