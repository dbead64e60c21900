//! Index views: the search surface of one index
//!
//! An [`IndexView`] is a cheap handle bound to one index of a collection. It
//! hands out [`IndexIter`]s positioned by the usual ordered-container
//! searches and pairs of them for ranges.
//!
//! Search keys are taken as `impl Into<K>`, so any type convertible to the
//! index key is accepted and converted before encoding.

use std::fmt;
use std::sync::Arc;

use strata_core::{IndexResult, KeyCompare};
use strata_storage::{KvEngine, PartitionId};

use crate::context::IndexContext;
use crate::iter::IndexIter;
use crate::record::{IndexKey, IndexKind, IndexTarget, KeyMarker, Record};

/// Search handle for one index.
pub struct IndexView<E: KvEngine, V: Record, K, C> {
    pub(crate) ctx: Arc<IndexContext<E, V>>,
    pub(crate) target: IndexTarget,
    pub(crate) compare: C,
    _key: KeyMarker<K>,
}

impl<E, V, K, C> IndexView<E, V, K, C>
where
    E: KvEngine,
    V: Record,
    K: IndexKey,
    C: KeyCompare<K>,
{
    pub(crate) fn new(ctx: Arc<IndexContext<E, V>>, target: IndexTarget, compare: C) -> Self {
        Self {
            ctx,
            target,
            compare,
            _key: KeyMarker::default(),
        }
    }

    /// Index name
    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Partition holding the index entries
    pub fn partition(&self) -> PartitionId {
        self.target.partition
    }

    /// Layout of the index
    pub fn kind(&self) -> IndexKind {
        self.target.kind
    }

    /// Compare policy of the index
    pub fn compare(&self) -> &C {
        &self.compare
    }

    /// Iterator on the first entry, or exhausted if the index is empty.
    pub fn begin(&self) -> IndexResult<IndexIter<E, V, K, C>> {
        IndexIter::begin(self)
    }

    /// The end sentinel. Never fails and opens no cursor.
    pub fn end(&self) -> IndexIter<E, V, K, C> {
        IndexIter::end(self)
    }

    /// Iterator on the last entry, or exhausted if the index is empty.
    pub fn last(&self) -> IndexResult<IndexIter<E, V, K, C>> {
        let mut it = self.end();
        it.retreat()?;
        Ok(it)
    }

    /// Entry whose key is equivalent to `key`, or [`end`](Self::end).
    ///
    /// For a non-unique index this is the first such entry.
    pub fn find(&self, key: impl Into<K>) -> IndexResult<IndexIter<E, V, K, C>> {
        IndexIter::find(self, &key.into())
    }

    /// First entry not ordered before `key`.
    pub fn lower_bound(&self, key: impl Into<K>) -> IndexResult<IndexIter<E, V, K, C>> {
        IndexIter::lower_bound(self, &key.into())
    }

    /// First entry ordered strictly after `key`.
    pub fn upper_bound(&self, key: impl Into<K>) -> IndexResult<IndexIter<E, V, K, C>> {
        IndexIter::upper_bound(self, &key.into())
    }

    /// `(lower_bound(key), upper_bound(key))`.
    ///
    /// Empty (both ends equal) when no entry is equivalent to `key`.
    pub fn equal_range(
        &self,
        key: impl Into<K>,
    ) -> IndexResult<(IndexIter<E, V, K, C>, IndexIter<E, V, K, C>)> {
        let key = key.into();
        let lower = IndexIter::lower_bound(self, &key)?;
        let upper = IndexIter::upper_bound(self, &key)?;
        Ok((lower, upper))
    }

    /// `(lower_bound(lo), upper_bound(hi))`: the closed interval `[lo, hi]`.
    ///
    /// When `hi` orders before `lo` the result is an empty range positioned
    /// at `upper_bound(hi)`.
    pub fn range(
        &self,
        lo: impl Into<K>,
        hi: impl Into<K>,
    ) -> IndexResult<(IndexIter<E, V, K, C>, IndexIter<E, V, K, C>)> {
        let (lo, hi) = (lo.into(), hi.into());
        let upper = IndexIter::upper_bound(self, &hi)?;
        if self.compare.less(&hi, &lo) {
            let lower = upper.try_clone()?;
            return Ok((lower, upper));
        }
        let lower = IndexIter::lower_bound(self, &lo)?;
        Ok((lower, upper))
    }

    /// Whether any entry is equivalent to `key`
    pub fn contains(&self, key: impl Into<K>) -> IndexResult<bool> {
        Ok(self.find(key)?.is_valid())
    }

    /// Number of entries equivalent to `key`, counted without dereferencing.
    pub fn count(&self, key: impl Into<K>) -> IndexResult<usize> {
        let (mut pos, end) = self.equal_range(key)?;
        let mut n = 0;
        while pos.is_valid() && pos != end {
            n += 1;
            pos.advance()?;
        }
        Ok(n)
    }

    /// Walk every record in index order.
    pub fn iter(&self) -> IndexResult<Walk<E, V, K, C>> {
        Ok(Walk::new(self.begin()?, self.end()))
    }

    /// Walk the records equivalent to `key`.
    pub fn equal_iter(&self, key: impl Into<K>) -> IndexResult<Walk<E, V, K, C>> {
        let (pos, end) = self.equal_range(key)?;
        Ok(Walk::new(pos, end))
    }

    /// Walk the records in `[lo, hi]`.
    pub fn range_iter(
        &self,
        lo: impl Into<K>,
        hi: impl Into<K>,
    ) -> IndexResult<Walk<E, V, K, C>> {
        let (pos, end) = self.range(lo, hi)?;
        Ok(Walk::new(pos, end))
    }
}

impl<E: KvEngine, V: Record, K, C: Clone> Clone for IndexView<E, V, K, C> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            target: self.target.clone(),
            compare: self.compare.clone(),
            _key: KeyMarker::default(),
        }
    }
}

impl<E: KvEngine, V: Record, K, C> fmt::Debug for IndexView<E, V, K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexView")
            .field("collection", &self.ctx.name)
            .field("index", &self.target.name)
            .field("partition", &self.target.partition)
            .field("kind", &self.target.kind)
            .finish()
    }
}

/// Rust iterator over a half-open `[pos, end)` pair of index iterators.
///
/// Yields each record once, in index order. Stops after the first error.
pub struct Walk<E: KvEngine, V: Record, K, C> {
    pos: IndexIter<E, V, K, C>,
    end: IndexIter<E, V, K, C>,
    failed: bool,
}

impl<E, V, K, C> Walk<E, V, K, C>
where
    E: KvEngine,
    V: Record,
    K: IndexKey,
    C: KeyCompare<K>,
{
    /// Walk from `pos` up to, not including, `end`
    pub fn new(pos: IndexIter<E, V, K, C>, end: IndexIter<E, V, K, C>) -> Self {
        Self {
            pos,
            end,
            failed: false,
        }
    }

    /// Current position of the walk
    pub fn position(&self) -> &IndexIter<E, V, K, C> {
        &self.pos
    }
}

impl<E, V, K, C> Iterator for Walk<E, V, K, C>
where
    E: KvEngine,
    V: Record,
    K: IndexKey,
    C: KeyCompare<K>,
{
    type Item = IndexResult<Arc<V>>;

    fn next(&mut self) -> Option<Self::Item> {
        // An exhausted position must not be advanced: that would wrap to begin
        if self.failed || !self.pos.is_valid() || self.pos == self.end {
            return None;
        }
        let item = self.pos.get();
        let step = self.pos.advance();
        match (item, step) {
            (Ok(record), Ok(())) => Some(Ok(record)),
            (Err(e), _) | (_, Err(e)) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
