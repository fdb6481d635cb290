//! Concurrency-safe get-or-create registry keyed by name.
//!
//! Lookups take the shared lock. Only inserting a missing entry takes the
//! exclusive lock, and the entry is re-checked under it so two racing callers
//! always end up holding the same `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

/// Registry of shared values keyed by string id.
pub struct KeyedRegistry<V> {
    entries: RwLock<HashMap<String, Arc<V>>>,
}

impl<V> Default for KeyedRegistry<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> std::fmt::Debug for KeyedRegistry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl<V> KeyedRegistry<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an existing entry.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.entries.read().get(key).cloned()
    }

    /// Return the entry for `key`, creating it with `init` on first access.
    pub fn get_or_insert_with<F>(&self, key: &str, init: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(existing) = self.entries.read().get(key) {
            return Arc::clone(existing);
        }

        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(init())),
        )
    }

    /// Remove an entry, returning it if present.
    pub fn remove(&self, key: &str) -> Option<Arc<V>> {
        self.entries.write().remove(key)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Point-in-time copy of all entries, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Arc<V>> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_get_or_insert_creates_once() {
        let registry: KeyedRegistry<AtomicUsize> = KeyedRegistry::new();
        let inits = AtomicUsize::new(0);

        let a = registry.get_or_insert_with("a", || {
            inits.fetch_add(1, Ordering::SeqCst);
            AtomicUsize::new(7)
        });
        let again = registry.get_or_insert_with("a", || {
            inits.fetch_add(1, Ordering::SeqCst);
            AtomicUsize::new(0)
        });

        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(again.load(Ordering::SeqCst), 7);
        assert_eq!(inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let registry: KeyedRegistry<u32> = KeyedRegistry::new();
        assert!(registry.get("nope").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry: KeyedRegistry<u32> = KeyedRegistry::new();
        registry.get_or_insert_with("zeta", || 1);
        registry.get_or_insert_with("alpha", || 2);

        let keys: Vec<_> = registry.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn test_remove_and_clear() {
        let registry: KeyedRegistry<u32> = KeyedRegistry::new();
        registry.get_or_insert_with("a", || 1);
        registry.get_or_insert_with("b", || 2);

        assert_eq!(registry.remove("a").as_deref(), Some(&1));
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_creation_converges() {
        let registry: Arc<KeyedRegistry<AtomicUsize>> = Arc::new(KeyedRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let entry = registry.get_or_insert_with("shared", || AtomicUsize::new(0));
                    entry.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 1);
        let shared = registry.get("shared").unwrap();
        assert_eq!(shared.load(Ordering::SeqCst), 8);
    }
}
