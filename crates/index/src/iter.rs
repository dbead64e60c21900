//! Bidirectional index iterator
//!
//! An [`IndexIter`] walks one index (primary or secondary) of a collection on
//! top of a native engine cursor.
//!
//! # Positions
//!
//! | [`Position`] | Cursor | Meaning |
//! |--------------|--------|---------|
//! | `Unpositioned` | none | the end sentinel |
//! | `Valid` | open, on an entry | dereferenceable |
//! | `Exhausted` | open, past either boundary | compares equal to the end sentinel |
//!
//! # Reading
//!
//! Dereference ([`IndexIter::get`]) resolves the current entry to the shared
//! record instance through the collection's [`ObjectCache`](crate::ObjectCache):
//!
//! - primary: ID from the entry key, record from the entry value on a miss
//! - secondary: ID from the entry value, then one point lookup into the
//!   primary partition. A missing primary entry is partition divergence,
//!   except behind a live cursor whose entry a concurrent remove also took
//!
//! # Moving
//!
//! `advance`/`retreat` delegate to the cursor. From a non-valid position they
//! reopen the cursor and land on the first (forward) or last (backward)
//! entry; an empty index stays exhausted.
//!
//! # Snapshots
//!
//! With `snapshot_reads` enabled, an iterator pins one engine snapshot when
//! its cursor is first opened and reads every position and primary lookup
//! through it. Copies share the snapshot.
//!
//! Each view is opened under a pin on the collection's write version. A
//! record written after the pin dereferences to the version the view holds,
//! served outside the identity cache; the canonical instance stays the one
//! the writer installed.
//!
//! The decoded key of the current entry is kept on the iterator after every
//! move. Codec faults therefore surface from the move that hit them, and
//! equality never fails.

use std::fmt;
use std::sync::Arc;

use strata_core::{
    pack_key, unpack_key, unpack_key_prefix, unpack_value, CodecResult, IndexError, IndexResult,
    KeyCompare, KeyDecode,
};
use strata_storage::{KvEngine, PartitionId, RawCursor};

use crate::context::IndexContext;
use crate::record::{IndexKey, IndexKind, IndexTarget, Record, Uniqueness};
use crate::version::ReadPin;
use crate::view::IndexView;

/// Where an iterator currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// No cursor is open
    Unpositioned,
    /// The cursor is on an entry
    Valid,
    /// The cursor is open but past either boundary
    Exhausted,
}

/// STL-style bidirectional iterator over one index.
pub struct IndexIter<E: KvEngine, V: Record, K, C> {
    ctx: Arc<IndexContext<E, V>>,
    target: IndexTarget,
    compare: C,
    snapshot: Option<E::Snapshot>,
    /// Write version the current view was opened under
    pin: Option<ReadPin<V::Id>>,
    cursor: Option<E::Cursor>,
    /// Decoded key of the current entry; `None` unless the cursor is valid
    current: Option<K>,
}

fn decode_entry_key<K: KeyDecode>(kind: IndexKind, raw: &[u8]) -> CodecResult<K> {
    match kind {
        IndexKind::Secondary(Uniqueness::NonUnique) => unpack_key_prefix(raw),
        IndexKind::Primary | IndexKind::Secondary(Uniqueness::Unique) => unpack_key(raw),
    }
}

impl<E, V, K, C> IndexIter<E, V, K, C>
where
    E: KvEngine,
    V: Record,
    K: IndexKey,
    C: KeyCompare<K>,
{
    // =========================================================================
    // Construction
    // =========================================================================

    /// The end sentinel: no cursor, no snapshot.
    pub(crate) fn end(view: &IndexView<E, V, K, C>) -> Self {
        Self {
            ctx: Arc::clone(&view.ctx),
            target: view.target.clone(),
            compare: view.compare.clone(),
            snapshot: None,
            pin: None,
            cursor: None,
            current: None,
        }
    }

    fn opened(view: &IndexView<E, V, K, C>) -> Self {
        let mut it = Self::end(view);
        it.reopen();
        it
    }

    pub(crate) fn begin(view: &IndexView<E, V, K, C>) -> IndexResult<Self> {
        let mut it = Self::opened(view);
        if let Some(cursor) = it.cursor.as_mut() {
            cursor.seek_to_first();
        }
        it.settle()?;
        Ok(it)
    }

    /// First entry whose encoded key is not below `key`'s encoding.
    pub(crate) fn lower_bound(view: &IndexView<E, V, K, C>, key: &K) -> IndexResult<Self> {
        let mut it = Self::opened(view);
        let target = pack_key(key);
        if let Some(cursor) = it.cursor.as_mut() {
            cursor.seek(&target);
        }
        it.settle()?;
        Ok(it)
    }

    /// Entry equivalent to `key`, or the end sentinel.
    pub(crate) fn find(view: &IndexView<E, V, K, C>, key: &K) -> IndexResult<Self> {
        let it = Self::lower_bound(view, key)?;
        let found = it
            .current
            .as_ref()
            .map_or(false, |current| it.compare.equivalent(key, current));
        if found {
            Ok(it)
        } else {
            Ok(Self::end(view))
        }
    }

    /// First entry strictly greater than `key` under the compare policy.
    ///
    /// Seeks to `key`, then steps past every entry that is not greater. Distinct
    /// encodings may be equivalent, so the engine's byte order alone cannot
    /// place this boundary.
    pub(crate) fn upper_bound(view: &IndexView<E, V, K, C>, key: &K) -> IndexResult<Self> {
        let mut it = Self::lower_bound(view, key)?;
        while it
            .current
            .as_ref()
            .map_or(false, |current| !it.compare.less(key, current))
        {
            if let Some(cursor) = it.cursor.as_mut() {
                cursor.next();
            }
            it.settle()?;
        }
        Ok(it)
    }

    /// Open a fresh cursor, pinning a snapshot first if none is held yet.
    fn reopen(&mut self) -> &mut E::Cursor {
        // A held snapshot keeps its pin; otherwise pin before the new view
        if self.snapshot.is_none() {
            self.pin = Some(self.ctx.pin());
            if self.ctx.config.snapshot_reads {
                self.snapshot = Some(self.ctx.engine.snapshot());
            }
        }
        tracing::trace!(
            target: "strata::index",
            index = %self.target.name,
            partition = %self.target.partition,
            "Opening cursor"
        );
        let cursor = self
            .ctx
            .engine
            .cursor(self.target.partition, self.snapshot.as_ref());
        self.cursor.insert(cursor)
    }

    /// Check the cursor after a move and decode the key it landed on.
    ///
    /// An engine or codec fault drops the cursor, leaving the iterator
    /// unpositioned, and is returned to the caller.
    fn settle(&mut self) -> IndexResult<()> {
        self.current = None;
        let Some(cursor) = self.cursor.as_ref() else {
            return Ok(());
        };
        if let Err(e) = cursor.status() {
            self.cursor = None;
            return Err(e.into());
        }
        if !cursor.valid() {
            return Ok(());
        }
        match decode_entry_key(self.target.kind, cursor.key()) {
            Ok(key) => {
                self.current = Some(key);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    target: "strata::index",
                    index = %self.target.name,
                    error = %e,
                    "Undecodable index key"
                );
                self.cursor = None;
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Current position state
    pub fn position(&self) -> Position {
        match &self.cursor {
            None => Position::Unpositioned,
            Some(_) if self.current.is_some() => Position::Valid,
            Some(_) => Position::Exhausted,
        }
    }

    /// Whether the iterator is on an entry
    pub fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    /// Decoded key of the current entry
    pub fn key(&self) -> Option<&K> {
        self.current.as_ref()
    }

    /// Name of the index being walked
    pub fn index_name(&self) -> &str {
        &self.target.name
    }

    /// Partition the cursor reads
    pub fn partition(&self) -> PartitionId {
        self.target.partition
    }

    /// Snapshot pinned by this iterator, if any
    pub fn snapshot(&self) -> Option<&E::Snapshot> {
        self.snapshot.as_ref()
    }

    fn valid_cursor(&self) -> Option<&E::Cursor> {
        self.cursor.as_ref().filter(|cursor| cursor.valid())
    }

    /// ID of the record at the current entry, without touching the cache.
    pub fn record_id(&self) -> IndexResult<Option<V::Id>> {
        let Some(cursor) = self.valid_cursor() else {
            return Ok(None);
        };
        let raw = match self.target.kind {
            IndexKind::Primary => cursor.key(),
            IndexKind::Secondary(_) => cursor.value(),
        };
        Ok(Some(unpack_key(raw)?))
    }

    /// Whether two iterators, possibly over different indices, stand on the
    /// same record. Two non-valid iterators count as the same position.
    pub fn same_record<K2, C2>(&self, other: &IndexIter<E, V, K2, C2>) -> IndexResult<bool>
    where
        K2: IndexKey,
        C2: KeyCompare<K2>,
    {
        Ok(self.record_id()? == other.record_id()?)
    }

    // =========================================================================
    // Dereference
    // =========================================================================

    /// Resolve the current entry to its shared record instance.
    ///
    /// A record rewritten or removed after this iterator's view was opened
    /// is returned as the view stores it, outside the identity cache.
    pub fn get(&self) -> IndexResult<Arc<V>> {
        let cursor = self.valid_cursor().ok_or(IndexError::InvalidPosition)?;
        let pin = self.pin.as_ref().ok_or(IndexError::InvalidPosition)?;
        match self.target.kind {
            IndexKind::Primary => {
                let id: V::Id = unpack_key(cursor.key())?;
                self.ctx
                    .resolve(&id, pin, || Ok(unpack_value(cursor.value())?))
            }
            IndexKind::Secondary(_) if self.ctx.config.verify_secondary => {
                let id: V::Id = unpack_key(cursor.value())?;
                let bytes = self.fetch_primary(cursor, &id)?;
                self.ctx.resolve(&id, pin, || Ok(unpack_value(&bytes)?))
            }
            IndexKind::Secondary(_) => {
                let id: V::Id = unpack_key(cursor.value())?;
                self.ctx.resolve(&id, pin, || {
                    Ok(unpack_value(&self.fetch_primary(cursor, &id)?)?)
                })
            }
        }
    }

    /// Point lookup of the primary record behind a secondary `entry`.
    fn fetch_primary(&self, entry: &E::Cursor, id: &V::Id) -> IndexResult<Vec<u8>> {
        self.ctx.stats.record_primary_lookup();
        let stored = self
            .ctx
            .engine
            .get(self.ctx.primary, &pack_key(id), self.snapshot.as_ref())?;
        if let Some(bytes) = stored {
            return Ok(bytes);
        }

        // Without a snapshot the lookup reads past the cursor's view. If the
        // entry is gone from the live index too, a remove committed in between.
        if self.snapshot.is_none()
            && self
                .ctx
                .engine
                .get(self.target.partition, entry.key(), None)?
                .is_none()
        {
            tracing::debug!(
                target: "strata::index",
                index = %self.target.name,
                id = ?id,
                "Record removed behind live cursor"
            );
            return Err(IndexError::removed(&*self.target.name, id));
        }

        tracing::error!(
            target: "strata::index",
            index = %self.target.name,
            id = ?id,
            "Secondary entry has no primary record"
        );
        Err(IndexError::divergence(&*self.target.name, id))
    }

    // =========================================================================
    // Movement
    // =========================================================================

    /// Step forward (`++it`).
    ///
    /// From a non-valid position the cursor is reopened at the first entry.
    pub fn advance(&mut self) -> IndexResult<()> {
        match self.cursor.as_mut().filter(|cursor| cursor.valid()) {
            Some(cursor) => cursor.next(),
            None => {
                self.ctx.stats.record_reopen();
                self.reopen().seek_to_first();
            }
        }
        self.settle()
    }

    /// Step backward (`--it`).
    ///
    /// From a non-valid position the cursor is reopened at the last entry.
    pub fn retreat(&mut self) -> IndexResult<()> {
        match self.cursor.as_mut().filter(|cursor| cursor.valid()) {
            Some(cursor) => cursor.prev(),
            None => {
                self.ctx.stats.record_reopen();
                self.reopen().seek_to_last();
            }
        }
        self.settle()
    }

    /// Step forward, returning a copy of the prior position (`it++`).
    pub fn post_advance(&mut self) -> IndexResult<Self> {
        let prior = self.try_clone()?;
        self.advance()?;
        Ok(prior)
    }

    /// Step backward, returning a copy of the prior position (`it--`).
    pub fn post_retreat(&mut self) -> IndexResult<Self> {
        let prior = self.try_clone()?;
        self.retreat()?;
        Ok(prior)
    }

    // =========================================================================
    // Copy and move
    // =========================================================================

    /// Copy the iterator onto its own cursor.
    ///
    /// The copy opens a new cursor on the same partition and snapshot and
    /// seeks it to the source's current key. Without a snapshot the entry may
    /// have changed in between, in which case the copy lands on the next one.
    pub fn try_clone(&self) -> IndexResult<Self> {
        let mut copy = self.detached();
        copy.snapshot = self.snapshot.clone();
        if let Some(source) = self.cursor.as_ref() {
            copy.pin = match copy.snapshot {
                Some(_) => self.pin.clone(),
                None => Some(self.ctx.pin()),
            };
            let mut cursor = self
                .ctx
                .engine
                .cursor(self.target.partition, copy.snapshot.as_ref());
            if source.valid() {
                cursor.seek(source.key());
            }
            copy.cursor = Some(cursor);
            copy.settle()?;
        }
        Ok(copy)
    }

    /// Move the position out, leaving this iterator unpositioned.
    pub fn take(&mut self) -> Self {
        let empty = self.detached();
        std::mem::replace(self, empty)
    }

    fn detached(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            target: self.target.clone(),
            compare: self.compare.clone(),
            snapshot: None,
            pin: None,
            cursor: None,
            current: None,
        }
    }
}

/// Two iterators are equal when both are non-valid, or both are valid and
/// their keys are equivalent under the compare policy.
impl<E, V, K, C> PartialEq for IndexIter<E, V, K, C>
where
    E: KvEngine,
    V: Record,
    K: IndexKey,
    C: KeyCompare<K>,
{
    fn eq(&self, other: &Self) -> bool {
        match (&self.current, &other.current) {
            (Some(a), Some(b)) => self.compare.equivalent(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<E, V, K, C> fmt::Debug for IndexIter<E, V, K, C>
where
    E: KvEngine,
    V: Record,
    K: IndexKey,
    C: KeyCompare<K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexIter")
            .field("index", &self.target.name)
            .field("position", &self.position())
            .field("key", &self.current)
            .field("snapshot", &self.snapshot.is_some())
            .finish()
    }
}
