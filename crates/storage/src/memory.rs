//! Ordered in-memory engine
//!
//! # Design
//!
//! - One `BTreeMap<Vec<u8>, Vec<u8>>` per partition, ordered by raw bytes
//! - Each map sits behind an `Arc`; writers update it with `Arc::make_mut`
//! - Snapshots and cursors hold their own `Arc` clones, so they keep a
//!   frozen view while writers move on (copy-on-write)
//! - A single `parking_lot::RwLock` guards the partition table; reads take
//!   it only long enough to clone the `Arc`s they need
//!
//! # Cost
//!
//! `Arc::make_mut` copies a whole partition map when any snapshot or cursor
//! still shares it. With snapshot reads on (the index default), a write that
//! lands while an iterator is open costs O(n) in the partition size. This is
//! a reference engine for tests and small data sets; a persistent-structure
//! map or an MVCC engine removes the copy.
//!
//! # Thread Safety
//!
//! All operations are thread-safe. A cursor is owned by one caller and needs
//! no locking after it is opened.
//!
//! # Example
//!
//! ```ignore
//! use strata_storage::{KvEngine, MemoryEngine, RawCursor, WriteBatch};
//!
//! let engine = MemoryEngine::new();
//! let p = engine.create_partition("accounts")?;
//! let mut batch = WriteBatch::new();
//! batch.put(p, b"a".to_vec(), b"1".to_vec());
//! engine.write(batch)?;
//!
//! let mut cursor = engine.cursor(p, None);
//! cursor.seek_to_first();
//! assert_eq!(cursor.key(), b"a");
//! ```

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use strata_core::StorageError;

use crate::engine::{BatchOp, KvEngine, PartitionId, RawCursor, StorageResult, WriteBatch};

type PartitionMap = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Default)]
struct State {
    names: FxHashMap<String, PartitionId>,
    partitions: Vec<Arc<PartitionMap>>,
    sequence: u64,
}

/// Operation counters, readable at any time.
#[derive(Debug, Default)]
pub struct EngineCounters {
    cursors_opened: AtomicU64,
    point_lookups: AtomicU64,
    batches_written: AtomicU64,
}

impl EngineCounters {
    /// Cursors opened so far
    pub fn cursors_opened(&self) -> u64 {
        self.cursors_opened.load(Ordering::Relaxed)
    }

    /// Point lookups served so far
    pub fn point_lookups(&self) -> u64 {
        self.point_lookups.load(Ordering::Relaxed)
    }

    /// Write batches applied so far
    pub fn batches_written(&self) -> u64 {
        self.batches_written.load(Ordering::Relaxed)
    }
}

/// Ordered in-memory key-value engine with copy-on-write snapshots.
pub struct MemoryEngine {
    state: RwLock<State>,
    counters: EngineCounters,
    /// When set, reads report an I/O fault
    fail_reads: AtomicBool,
}

impl MemoryEngine {
    /// Create an engine with no partitions
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            counters: EngineCounters::default(),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Create an engine with the given partitions, in order
    pub fn with_partitions<'a>(
        names: impl IntoIterator<Item = &'a str>,
    ) -> StorageResult<(Self, Vec<PartitionId>)> {
        let engine = Self::new();
        let ids = names
            .into_iter()
            .map(|name| engine.create_partition(name))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok((engine, ids))
    }

    /// Number of partitions
    pub fn partition_count(&self) -> usize {
        self.state.read().partitions.len()
    }

    /// Number of entries stored in one partition
    pub fn entry_count(&self, partition: PartitionId) -> usize {
        self.state
            .read()
            .partitions
            .get(partition.index())
            .map(|map| map.len())
            .unwrap_or(0)
    }

    /// Number of batches applied since creation
    pub fn sequence(&self) -> u64 {
        self.state.read().sequence
    }

    /// Operation counters
    pub fn counters(&self) -> &EngineCounters {
        &self.counters
    }

    /// Make subsequent reads (cursors and point lookups) fail.
    ///
    /// Used to exercise fault propagation.
    pub fn inject_read_failure(&self, enabled: bool) {
        self.fail_reads.store(enabled, Ordering::Release);
    }

    fn read_fault(&self) -> Option<StorageError> {
        self.fail_reads
            .load(Ordering::Acquire)
            .then(|| StorageError::Io("injected read failure".to_string()))
    }

    fn live_map(&self, partition: PartitionId) -> Option<Arc<PartitionMap>> {
        self.state.read().partitions.get(partition.index()).cloned()
    }

    fn resolve_map(
        &self,
        partition: PartitionId,
        snapshot: Option<&MemorySnapshot>,
    ) -> StorageResult<Arc<PartitionMap>> {
        let map = match snapshot {
            Some(snap) => snap.partitions.get(partition.index()).cloned(),
            None => self.live_map(partition),
        };
        map.ok_or_else(|| StorageError::UnknownPartition(partition.to_string()))
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemoryEngine")
            .field("partition_count", &state.partitions.len())
            .field("sequence", &state.sequence)
            .field(
                "total_entries",
                &state.partitions.iter().map(|m| m.len()).sum::<usize>(),
            )
            .finish()
    }
}

impl KvEngine for MemoryEngine {
    type Cursor = MemoryCursor;
    type Snapshot = MemorySnapshot;

    fn create_partition(&self, name: &str) -> StorageResult<PartitionId> {
        let mut state = self.state.write();
        if state.names.contains_key(name) {
            return Err(StorageError::PartitionExists(name.to_string()));
        }
        let id = PartitionId(state.partitions.len() as u32);
        state.partitions.push(Arc::new(PartitionMap::new()));
        state.names.insert(name.to_string(), id);
        tracing::debug!(target: "strata::storage", partition = %id, name, "Created partition");
        Ok(id)
    }

    fn partition(&self, name: &str) -> Option<PartitionId> {
        self.state.read().names.get(name).copied()
    }

    fn snapshot(&self) -> MemorySnapshot {
        let state = self.state.read();
        MemorySnapshot {
            sequence: state.sequence,
            partitions: Arc::new(state.partitions.clone()),
        }
    }

    fn cursor(&self, partition: PartitionId, snapshot: Option<&MemorySnapshot>) -> MemoryCursor {
        self.counters.cursors_opened.fetch_add(1, Ordering::Relaxed);
        if let Some(fault) = self.read_fault() {
            return MemoryCursor::failed(fault);
        }
        match self.resolve_map(partition, snapshot) {
            Ok(map) => MemoryCursor::new(map),
            Err(e) => MemoryCursor::failed(e),
        }
    }

    fn get(
        &self,
        partition: PartitionId,
        key: &[u8],
        snapshot: Option<&MemorySnapshot>,
    ) -> StorageResult<Option<Vec<u8>>> {
        self.counters.point_lookups.fetch_add(1, Ordering::Relaxed);
        if let Some(fault) = self.read_fault() {
            return Err(fault);
        }
        let map = self.resolve_map(partition, snapshot)?;
        Ok(map.get(key).cloned())
    }

    fn write(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut state = self.state.write();

        // Reject the whole batch before touching anything
        if let Some(op) = batch
            .ops()
            .iter()
            .find(|op| op.partition().index() >= state.partitions.len())
        {
            return Err(StorageError::UnknownPartition(op.partition().to_string()));
        }

        for op in batch.into_ops() {
            match op {
                BatchOp::Put {
                    partition,
                    key,
                    value,
                } => {
                    Arc::make_mut(&mut state.partitions[partition.index()]).insert(key, value);
                }
                BatchOp::Delete { partition, key } => {
                    Arc::make_mut(&mut state.partitions[partition.index()]).remove(&key);
                }
            }
        }
        state.sequence += 1;
        self.counters.batches_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Frozen view of every partition at one sequence number.
#[derive(Clone)]
pub struct MemorySnapshot {
    sequence: u64,
    partitions: Arc<Vec<Arc<PartitionMap>>>,
}

impl MemorySnapshot {
    /// Sequence number the snapshot was taken at
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl std::fmt::Debug for MemorySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySnapshot")
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Bidirectional cursor over one frozen partition map.
pub struct MemoryCursor {
    map: Arc<PartitionMap>,
    /// Copy of the current entry; `None` when not positioned
    current: Option<(Vec<u8>, Vec<u8>)>,
    error: Option<StorageError>,
}

impl MemoryCursor {
    fn new(map: Arc<PartitionMap>) -> Self {
        Self {
            map,
            current: None,
            error: None,
        }
    }

    fn failed(error: StorageError) -> Self {
        Self {
            map: Arc::new(PartitionMap::new()),
            current: None,
            error: Some(error),
        }
    }

    fn land(&mut self, entry: Option<(&Vec<u8>, &Vec<u8>)>) {
        self.current = entry.map(|(k, v)| (k.clone(), v.clone()));
    }
}

impl RawCursor for MemoryCursor {
    fn valid(&self) -> bool {
        self.error.is_none() && self.current.is_some()
    }

    fn seek(&mut self, target: &[u8]) {
        let map = Arc::clone(&self.map);
        self.land(
            map.range::<[u8], _>((Bound::Included(target), Bound::Unbounded))
                .next(),
        );
    }

    fn seek_to_first(&mut self) {
        let map = Arc::clone(&self.map);
        self.land(map.iter().next());
    }

    fn seek_to_last(&mut self) {
        let map = Arc::clone(&self.map);
        self.land(map.iter().next_back());
    }

    fn next(&mut self) {
        let Some((key, _)) = self.current.take() else {
            return;
        };
        let map = Arc::clone(&self.map);
        self.land(
            map.range::<[u8], _>((Bound::Excluded(key.as_slice()), Bound::Unbounded))
                .next(),
        );
    }

    fn prev(&mut self) {
        let Some((key, _)) = self.current.take() else {
            return;
        };
        let map = Arc::clone(&self.map);
        self.land(
            map.range::<[u8], _>((Bound::Unbounded, Bound::Excluded(key.as_slice())))
                .next_back(),
        );
    }

    fn key(&self) -> &[u8] {
        self.current.as_ref().map(|(k, _)| k.as_slice()).unwrap_or(&[])
    }

    fn value(&self) -> &[u8] {
        self.current.as_ref().map(|(_, v)| v.as_slice()).unwrap_or(&[])
    }

    fn status(&self) -> StorageResult<()> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
