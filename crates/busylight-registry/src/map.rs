//! Key to loading-flag map.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    loading: bool,
    /// Position in first-insertion order.
    order: u64,
}

/// Loading flags by key, remembering the order keys were first written.
///
/// A key that was never written (or was cleared) reads as not loading.
/// This is the value published to [`LoadingRegistry::subscribe`](crate::LoadingRegistry::subscribe)
/// receivers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadingMap {
    slots: HashMap<String, Slot>,
    next_order: u64,
}

impl LoadingMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `key` is loading. Absent keys are not loading.
    #[must_use]
    pub fn is_loading(&self, key: &str) -> bool {
        self.slots.get(key).is_some_and(|slot| slot.loading)
    }

    /// Returns true if `key` is present, loading or not.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the map has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns all keys with their flags, in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<(&str, bool)> {
        self.scoped(None)
    }

    /// Returns true if any key is loading.
    #[must_use]
    pub fn is_any_loading(&self) -> bool {
        self.any_in(None)
    }

    /// Returns true if the map is non-empty and every key is loading.
    #[must_use]
    pub fn is_all_loading(&self) -> bool {
        self.all_in(None)
    }

    /// Returns the number of keys currently loading.
    #[must_use]
    pub fn loading_count(&self) -> usize {
        self.count_in(None)
    }

    /// Returns the keys currently loading, in insertion order.
    #[must_use]
    pub fn loading_keys(&self) -> Vec<String> {
        self.keys_in(None)
    }

    /// Entries whose key starts with `scope`, in insertion order.
    pub(crate) fn scoped(&self, scope: Option<&str>) -> Vec<(&str, bool)> {
        let mut entries: Vec<_> = self
            .slots
            .iter()
            .filter(|(key, _)| in_scope(key, scope))
            .map(|(key, slot)| (key.as_str(), *slot))
            .collect();
        entries.sort_by_key(|(_, slot)| slot.order);
        entries
            .into_iter()
            .map(|(key, slot)| (key, slot.loading))
            .collect()
    }

    pub(crate) fn any_in(&self, scope: Option<&str>) -> bool {
        self.slots
            .iter()
            .any(|(key, slot)| slot.loading && in_scope(key, scope))
    }

    pub(crate) fn all_in(&self, scope: Option<&str>) -> bool {
        let mut scoped = self
            .slots
            .iter()
            .filter(|(key, _)| in_scope(key, scope))
            .peekable();
        scoped.peek().is_some() && scoped.all(|(_, slot)| slot.loading)
    }

    pub(crate) fn count_in(&self, scope: Option<&str>) -> usize {
        self.slots
            .iter()
            .filter(|(key, slot)| slot.loading && in_scope(key, scope))
            .count()
    }

    pub(crate) fn keys_in(&self, scope: Option<&str>) -> Vec<String> {
        self.scoped(scope)
            .into_iter()
            .filter(|(_, loading)| *loading)
            .map(|(key, _)| key.to_string())
            .collect()
    }

    /// Sets a flag, creating the key if needed. Returns true if the map changed.
    pub(crate) fn set(&mut self, key: &str, loading: bool) -> bool {
        if let Some(slot) = self.slots.get_mut(key) {
            let changed = slot.loading != loading;
            slot.loading = loading;
            return changed;
        }

        let order = self.next_order;
        self.next_order += 1;
        self.slots.insert(key.to_string(), Slot { loading, order });
        true
    }

    /// Removes a key. Returns true if it was present.
    pub(crate) fn remove(&mut self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    /// Sets every in-scope flag to false, keeping the keys. Returns the keys
    /// that were loading.
    pub(crate) fn reset(&mut self, scope: Option<&str>) -> Vec<String> {
        let mut reset = Vec::new();
        for (key, slot) in &mut self.slots {
            if slot.loading && in_scope(key, scope) {
                slot.loading = false;
                reset.push((slot.order, key.clone()));
            }
        }
        reset.sort();
        reset.into_iter().map(|(_, key)| key).collect()
    }

    /// Removes every in-scope key. Returns how many were removed.
    pub(crate) fn clear(&mut self, scope: Option<&str>) -> usize {
        let before = self.slots.len();
        self.slots.retain(|key, _| !in_scope(key, scope));
        before - self.slots.len()
    }
}

fn in_scope(key: &str, scope: Option<&str>) -> bool {
    scope.is_none_or(|prefix| key.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_key_not_loading() {
        let map = LoadingMap::new();
        assert!(!map.is_loading("missing"));
        assert!(!map.contains("missing"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_set_reports_changes() {
        let mut map = LoadingMap::new();
        assert!(map.set("a", false));
        assert!(!map.set("a", false));
        assert!(map.set("a", true));
        assert!(!map.set("a", true));
        assert!(map.is_loading("a"));
    }

    #[test]
    fn test_aggregates() {
        let mut map = LoadingMap::new();
        assert!(!map.is_any_loading());
        assert!(!map.is_all_loading());
        assert_eq!(map.loading_count(), 0);

        map.set("a", true);
        map.set("b", false);
        assert!(map.is_any_loading());
        assert!(!map.is_all_loading());
        assert_eq!(map.loading_count(), 1);

        map.set("b", true);
        assert!(map.is_all_loading());
        assert_eq!(map.loading_count(), 2);
    }

    #[test]
    fn test_loading_keys_in_insertion_order() {
        let mut map = LoadingMap::new();
        for key in ["zeta", "alpha", "mid", "beta"] {
            map.set(key, true);
        }
        map.set("mid", false);
        // Re-setting keeps the original position.
        map.set("zeta", true);

        assert_eq!(map.loading_keys(), vec!["zeta", "alpha", "beta"]);
        assert_eq!(
            map.entries(),
            vec![
                ("zeta", true),
                ("alpha", true),
                ("mid", false),
                ("beta", true)
            ]
        );
    }

    #[test]
    fn test_removed_key_reinserted_at_end() {
        let mut map = LoadingMap::new();
        map.set("a", true);
        map.set("b", true);
        assert!(map.remove("a"));
        assert!(!map.remove("a"));
        map.set("a", true);

        assert_eq!(map.loading_keys(), vec!["b", "a"]);
    }

    #[test]
    fn test_scoped_operations() {
        let mut map = LoadingMap::new();
        map.set("users:list", true);
        map.set("users:detail", false);
        map.set("orders:list", true);

        let users = Some("users:");
        assert!(map.any_in(users));
        assert!(!map.all_in(users));
        assert_eq!(map.count_in(users), 1);
        assert_eq!(map.keys_in(users), vec!["users:list"]);
        assert!(!map.all_in(Some("missing:")));

        assert_eq!(map.reset(users), vec!["users:list"]);
        assert!(map.contains("users:list"));
        assert!(map.is_loading("orders:list"));

        assert_eq!(map.clear(users), 2);
        assert_eq!(map.len(), 1);
        assert!(map.is_loading("orders:list"));
    }
}
