//! Object identity cache
//!
//! Guarantees at most one live in-memory instance per record ID, shared by
//! every index and iterator of a collection.
//!
//! # Design
//!
//! - `DashMap<Id, Weak<V>>`: sharded map, lock-free reads
//! - The map holds `Weak` handles only. A record stays resident while some
//!   caller holds its `Arc`; the cache alone never keeps it alive
//! - Install-or-return-existing runs under the shard lock of the ID's entry,
//!   so two racing installs of one ID resolve to a single instance
//! - Dead `Weak` entries are dropped lazily on lookup, or in bulk by [`ObjectCache::purge`]
//!
//! Residency beyond the holders' lifetimes is a separate concern, handled by
//! [`retain::RetentionPolicy`].
//!
//! # Example
//!
//! ```ignore
//! let cache = ObjectCache::<Account>::new();
//! let a = cache.cache(account.clone());
//! let b = cache.cache(account);          // same ID: `account` is discarded
//! assert!(Arc::ptr_eq(&a, &b));
//! ```

pub mod retain;

use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::record::Record;

pub use retain::RetentionPolicy;

/// Identity map from record ID to the live shared instance.
pub struct ObjectCache<V: Record> {
    entries: DashMap<V::Id, Weak<V>>,
}

impl<V: Record> ObjectCache<V> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return the live instance for `id`, if one exists.
    ///
    /// A miss has no side effect beyond dropping a dead entry.
    pub fn get(&self, id: &V::Id) -> Option<Arc<V>> {
        let weak = self.entries.get(id).map(|entry| Weak::clone(entry.value()))?;
        match weak.upgrade() {
            Some(live) => Some(live),
            None => {
                self.entries.remove_if(id, |_, w| w.strong_count() == 0);
                None
            }
        }
    }

    /// Install a freshly decoded record and return the canonical instance.
    ///
    /// If a live instance already exists under the record's ID, `value` is
    /// dropped and the existing instance is returned.
    pub fn cache(&self, value: V) -> Arc<V> {
        let entry = self.entries.entry(value.id());
        Self::install(entry, value)
    }

    /// Like [`cache`](Self::cache), unless `stale` holds for the record's ID.
    ///
    /// `stale` runs under the entry's shard lock, so it is ordered against
    /// [`replace`](Self::replace) and [`invalidate`](Self::invalidate) of the
    /// same ID. A stale `value` is handed back untouched.
    pub fn cache_unless(&self, value: V, stale: impl FnOnce(&V::Id) -> bool) -> Result<Arc<V>, V> {
        let entry = self.entries.entry(value.id());
        if stale(entry.key()) {
            return Err(value);
        }
        Ok(Self::install(entry, value))
    }

    fn install(entry: Entry<'_, V::Id, Weak<V>>, value: V) -> Arc<V> {
        match entry {
            Entry::Occupied(mut entry) => {
                if let Some(live) = entry.get().upgrade() {
                    return live;
                }
                let fresh = Arc::new(value);
                entry.insert(Arc::downgrade(&fresh));
                fresh
            }
            Entry::Vacant(entry) => {
                let fresh = Arc::new(value);
                entry.insert(Arc::downgrade(&fresh));
                fresh
            }
        }
    }

    /// Install `value` as the new canonical instance for its ID.
    ///
    /// Used after the stored record changed. Holders of the previous
    /// instance keep it; later lookups see the new one.
    pub fn replace(&self, value: V) -> Arc<V> {
        let fresh = Arc::new(value);
        self.entries.insert(fresh.id(), Arc::downgrade(&fresh));
        fresh
    }

    /// Forget the instance for `id`. Returns whether an entry existed.
    pub fn invalidate(&self, id: &V::Id) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Drop every entry whose record is no longer held. Returns the count.
    pub fn purge(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries, live or dead
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries whose record is still held somewhere
    pub fn live_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<V: Record> Default for ObjectCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Record> std::fmt::Debug for ObjectCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCache")
            .field("entries", &self.len())
            .field("live", &self.live_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::sync::Barrier;
    use std::thread;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        id: u64,
        body: String,
    }

    impl Record for Doc {
        type Id = u64;
        fn id(&self) -> u64 {
            self.id
        }
    }

    fn doc(id: u64, body: &str) -> Doc {
        Doc {
            id,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_miss_on_empty() {
        let cache = ObjectCache::<Doc>::new();
        assert!(cache.get(&1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_then_get_is_same_instance() {
        let cache = ObjectCache::new();
        let installed = cache.cache(doc(1, "a"));
        let fetched = cache.get(&1).unwrap();
        assert!(Arc::ptr_eq(&installed, &fetched));
    }

    #[test]
    fn test_second_install_returns_existing() {
        let cache = ObjectCache::new();
        let first = cache.cache(doc(1, "first"));
        let second = cache.cache(doc(1, "second"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.body, "first");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_does_not_keep_records_alive() {
        let cache = ObjectCache::new();
        let installed = cache.cache(doc(1, "a"));
        assert_eq!(cache.live_count(), 1);
        drop(installed);

        assert_eq!(cache.live_count(), 0);
        assert!(cache.get(&1).is_none());
        // Dead entry was dropped by the lookup
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_reinstall_after_release() {
        let cache = ObjectCache::new();
        drop(cache.cache(doc(1, "old")));
        let fresh = cache.cache(doc(1, "new"));
        assert_eq!(fresh.body, "new");
        assert!(Arc::ptr_eq(&fresh, &cache.get(&1).unwrap()));
    }

    #[test]
    fn test_replace_switches_canonical_instance() {
        let cache = ObjectCache::new();
        let old = cache.cache(doc(1, "old"));
        let new = cache.replace(doc(1, "new"));

        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(old.body, "old");
        assert!(Arc::ptr_eq(&new, &cache.get(&1).unwrap()));
    }

    #[test]
    fn test_cache_unless_rejects_stale_value() {
        let cache = ObjectCache::new();
        let rejected = cache.cache_unless(doc(1, "old"), |id| *id == 1);
        assert_eq!(rejected, Err(doc(1, "old")));
        assert!(cache.get(&1).is_none());

        let installed = cache.cache_unless(doc(2, "b"), |_| false).unwrap();
        assert!(Arc::ptr_eq(&installed, &cache.get(&2).unwrap()));
    }

    #[test]
    fn test_invalidate() {
        let cache = ObjectCache::new();
        let held = cache.cache(doc(1, "a"));
        assert!(cache.invalidate(&1));
        assert!(!cache.invalidate(&1));
        assert!(cache.get(&1).is_none());
        assert_eq!(held.body, "a");
    }

    #[test]
    fn test_purge_drops_only_dead_entries() {
        let cache = ObjectCache::new();
        let kept = cache.cache(doc(1, "a"));
        drop(cache.cache(doc(2, "b")));
        drop(cache.cache(doc(3, "c")));

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.purge(), 2);
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&kept, &cache.get(&1).unwrap()));
    }

    #[test]
    fn test_concurrent_install_yields_one_instance() {
        let cache = Arc::new(ObjectCache::new());
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|t| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (0..50u64)
                        .map(|id| cache.cache(doc(id, &format!("thread-{}", t))))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Vec<Arc<Doc>>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for id in 0..50usize {
            let canonical = &results[0][id];
            for per_thread in &results[1..] {
                assert!(Arc::ptr_eq(canonical, &per_thread[id]));
            }
        }
        assert_eq!(cache.live_count(), 50);
    }

    #[test]
    fn test_debug_impl() {
        let cache = ObjectCache::new();
        let _held = cache.cache(doc(1, "a"));
        let debug_str = format!("{:?}", cache);
        assert!(debug_str.contains("ObjectCache"));
        assert!(debug_str.contains("live: 1"));
    }
}
