//! Per-record write versions
//!
//! A reader that decodes a record from an older view (a pinned snapshot, or
//! a cursor opened before a write) must not install it as the canonical
//! instance once a writer has replaced or removed that record.
//!
//! Writers stamp each ID they write with the next version, update the cache,
//! then publish the version. Readers take a [`ReadPin`] on the published
//! version before opening their view; a record stamped after the pin is
//! served from the reader's view without entering the cache.
//!
//! # Ordering
//!
//! - stamp, then cache update, then publish. A reader that observes the new
//!   cached instance therefore observes the stamp too
//! - pin, then open the engine view. Every version at or below the pin is
//!   visible to that view
//!
//! Stamps at or below every live pin can no longer reject anything and are
//! pruned once the stamp map grows past a threshold.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Stamp count below which no pruning is attempted
const PRUNE_FLOOR: usize = 1024;

pub(crate) struct VersionLog<Id: Eq + Hash> {
    /// Newest published version
    version: AtomicU64,
    /// Version of the last write per ID
    stamps: DashMap<Id, u64>,
    /// Pinned version -> number of live pins
    pins: Mutex<BTreeMap<u64, usize>>,
    prune_at: AtomicUsize,
}

impl<Id: Eq + Hash + Clone> VersionLog<Id> {
    pub(crate) fn new() -> Self {
        Self {
            version: AtomicU64::new(0),
            stamps: DashMap::new(),
            pins: Mutex::new(BTreeMap::new()),
            prune_at: AtomicUsize::new(PRUNE_FLOOR),
        }
    }

    /// Newest published version
    #[inline]
    pub(crate) fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Stamp `id` with the version following the published one.
    ///
    /// Callers serialize writes; the stamp stays ahead of every pin until
    /// [`publish`](Self::publish) runs.
    pub(crate) fn stamp(&self, id: Id) -> u64 {
        let version = self.version() + 1;
        self.stamps.insert(id, version);
        version
    }

    /// Make `version` visible to new pins.
    pub(crate) fn publish(&self, version: u64) {
        self.version.store(version, Ordering::Release);
        if self.stamps.len() >= self.prune_at.load(Ordering::Relaxed) {
            self.prune();
        }
    }

    /// Whether `id` was written after `pinned`
    pub(crate) fn written_since(&self, id: &Id, pinned: u64) -> bool {
        self.stamps.get(id).map_or(false, |stamp| *stamp > pinned)
    }

    /// Pin the published version until the returned guard drops.
    pub(crate) fn pin(self: &Arc<Self>) -> ReadPin<Id> {
        let mut pins = self.pins.lock();
        let version = self.version();
        *pins.entry(version).or_insert(0) += 1;
        ReadPin {
            log: Arc::clone(self),
            version,
        }
    }

    fn release(&self, version: u64) {
        let mut pins = self.pins.lock();
        if let Some(count) = pins.get_mut(&version) {
            *count -= 1;
            if *count == 0 {
                pins.remove(&version);
            }
        }
    }

    fn prune(&self) {
        // New pins land at or above the published version, so the floor
        // holds once the lock is released.
        let floor = {
            let pins = self.pins.lock();
            pins.keys().next().copied().unwrap_or_else(|| self.version())
        };
        let before = self.stamps.len();
        self.stamps.retain(|_, stamp| *stamp > floor);
        let kept = self.stamps.len();
        self.prune_at
            .store((kept * 2).max(PRUNE_FLOOR), Ordering::Relaxed);
        tracing::trace!(
            target: "strata::index",
            floor,
            pruned = before - kept,
            kept,
            "Pruned write stamps"
        );
    }

    /// Number of IDs carrying a stamp
    #[cfg(test)]
    pub(crate) fn stamp_count(&self) -> usize {
        self.stamps.len()
    }

    /// Number of live pins
    #[cfg(test)]
    pub(crate) fn pin_count(&self) -> usize {
        self.pins.lock().values().sum()
    }
}

impl<Id: Eq + Hash> fmt::Debug for VersionLog<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionLog")
            .field("version", &self.version.load(Ordering::Relaxed))
            .field("stamps", &self.stamps.len())
            .finish()
    }
}

/// A reader's claim on one published version.
///
/// Keeps stamps newer than the pinned version from being pruned.
pub(crate) struct ReadPin<Id: Eq + Hash + Clone> {
    log: Arc<VersionLog<Id>>,
    version: u64,
}

impl<Id: Eq + Hash + Clone> ReadPin<Id> {
    #[inline]
    pub(crate) fn version(&self) -> u64 {
        self.version
    }
}

impl<Id: Eq + Hash + Clone> Clone for ReadPin<Id> {
    fn clone(&self) -> Self {
        *self.log.pins.lock().entry(self.version).or_insert(0) += 1;
        Self {
            log: Arc::clone(&self.log),
            version: self.version,
        }
    }
}

impl<Id: Eq + Hash + Clone> Drop for ReadPin<Id> {
    fn drop(&mut self) {
        self.log.release(self.version);
    }
}
