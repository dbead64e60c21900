//! Bounded retention of recently used records
//!
//! The identity map holds only `Weak` handles, so a record is dropped as soon
//! as its last holder lets go. This layer keeps up to `capacity` strong
//! handles to the most recently dereferenced records, evicting the least
//! recently used. It never decides identity: eviction here only releases one
//! holder, it does not remove anything from the identity map.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::record::Record;

/// LRU set of strong record handles.
pub struct RetentionPolicy<V: Record> {
    /// `None` when retention is disabled
    held: Option<Mutex<LruCache<V::Id, Arc<V>>>>,
}

impl<V: Record> RetentionPolicy<V> {
    /// Create a policy keeping at most `capacity` records. `0` keeps none.
    pub fn new(capacity: usize) -> Self {
        Self {
            held: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// Maximum number of retained records
    pub fn capacity(&self) -> usize {
        self.held
            .as_ref()
            .map_or(0, |held| held.lock().cap().get())
    }

    /// Mark `record` as most recently used, retaining it.
    ///
    /// Replaces a retained older instance of the same ID.
    pub fn touch(&self, record: &Arc<V>) {
        if let Some(held) = &self.held {
            held.lock().put(record.id(), Arc::clone(record));
        }
    }

    /// Stop retaining the record with `id`
    pub fn forget(&self, id: &V::Id) {
        if let Some(held) = &self.held {
            held.lock().pop(id);
        }
    }

    /// Whether the record with `id` is currently retained
    pub fn contains(&self, id: &V::Id) -> bool {
        self.held
            .as_ref()
            .map_or(false, |held| held.lock().contains(id))
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.held.as_ref().map_or(0, |held| held.lock().len())
    }

    /// Whether nothing is retained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every retained record
    pub fn clear(&self) {
        if let Some(held) = &self.held {
            held.lock().clear();
        }
    }
}
