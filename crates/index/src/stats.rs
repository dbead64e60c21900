//! Read-path counters
//!
//! Relaxed atomics, one set per collection. Readable while iterators run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the read path of one collection.
#[derive(Debug, Default)]
pub struct IndexStats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    primary_lookups: AtomicU64,
    cursor_reopens: AtomicU64,
    stale_reads: AtomicU64,
}

/// Point-in-time copy of [`IndexStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Dereferences served by an already-live instance
    pub cache_hits: u64,
    /// Dereferences that decoded and installed a record
    pub cache_misses: u64,
    /// Point lookups into the primary partition from secondary dereferences
    pub primary_lookups: u64,
    /// Exhausted or unpositioned iterators that reopened their cursor
    pub cursor_reopens: u64,
    /// Dereferences of a version superseded by a later write, served
    /// from the iterator's view without entering the cache
    pub stale_reads: u64,
}

impl IndexStats {
    #[inline]
    pub(crate) fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_primary_lookup(&self) {
        self.primary_lookups.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reopen(&self) {
        self.cursor_reopens.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_stale_read(&self) {
        self.stale_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            primary_lookups: self.primary_lookups.load(Ordering::Relaxed),
            cursor_reopens: self.cursor_reopens.load(Ordering::Relaxed),
            stale_reads: self.stale_reads.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Fraction of dereferences served from the cache, if any happened
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.cache_hits + self.cache_misses;
        (total > 0).then(|| self.cache_hits as f64 / total as f64)
    }
}
