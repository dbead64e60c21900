//! Key-value engine interface
//!
//! An engine stores byte keys and values in named partitions (column
//! families). Each partition is ordered by raw key bytes. The interface mirrors
//! what a RocksDB-style engine offers:
//!
//! - bidirectional cursors with `seek`, `seek_to_first`, `seek_to_last`
//! - point lookups
//! - snapshots that pin a point-in-time view
//! - atomic write batches spanning partitions
//!
//! Opening a cursor never fails. Faults (including an unknown partition)
//! surface through [`RawCursor::status`], as they do for RocksDB iterators.

use std::fmt;

use strata_core::StorageError;

/// Result type for engine operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Handle to one partition of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(pub u32);

impl PartitionId {
    /// Position of the partition in engine-internal tables
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A native cursor over one partition.
///
/// `key()` and `value()` may only be called while `valid()` is true.
pub trait RawCursor: Send {
    /// Whether the cursor points at an entry
    fn valid(&self) -> bool;

    /// Position at the first entry with key >= `target`
    fn seek(&mut self, target: &[u8]);

    /// Position at the first entry
    fn seek_to_first(&mut self);

    /// Position at the last entry
    fn seek_to_last(&mut self);

    /// Move to the next entry; becomes invalid past the last one
    fn next(&mut self);

    /// Move to the previous entry; becomes invalid before the first one
    fn prev(&mut self);

    /// Key bytes of the current entry
    fn key(&self) -> &[u8];

    /// Value bytes of the current entry
    fn value(&self) -> &[u8];

    /// Error state of the cursor, if any operation failed
    fn status(&self) -> StorageResult<()>;
}

/// An ordered, partitioned key-value engine.
pub trait KvEngine: Send + Sync + 'static {
    /// Native cursor type
    type Cursor: RawCursor;

    /// Point-in-time read view
    type Snapshot: Clone + Send + Sync + 'static;

    /// Create a new, empty partition.
    fn create_partition(&self, name: &str) -> StorageResult<PartitionId>;

    /// Look up a partition by name.
    fn partition(&self, name: &str) -> Option<PartitionId>;

    /// Pin the current state of every partition.
    fn snapshot(&self) -> Self::Snapshot;

    /// Open an unpositioned cursor, reading through `snapshot` if given.
    fn cursor(&self, partition: PartitionId, snapshot: Option<&Self::Snapshot>) -> Self::Cursor;

    /// Point lookup, reading through `snapshot` if given.
    fn get(
        &self,
        partition: PartitionId,
        key: &[u8],
        snapshot: Option<&Self::Snapshot>,
    ) -> StorageResult<Option<Vec<u8>>>;

    /// Apply every operation of `batch` atomically.
    fn write(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Create the partition if missing and return its handle.
    fn open_partition(&self, name: &str) -> StorageResult<PartitionId> {
        match self.partition(name) {
            Some(id) => Ok(id),
            None => self.create_partition(name),
        }
    }
}

/// One operation of a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or overwrite a key
    Put {
        /// Target partition
        partition: PartitionId,
        /// Key bytes
        key: Vec<u8>,
        /// Value bytes
        value: Vec<u8>,
    },
    /// Remove a key if present
    Delete {
        /// Target partition
        partition: PartitionId,
        /// Key bytes
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Partition the operation targets
    pub fn partition(&self) -> PartitionId {
        match self {
            BatchOp::Put { partition, .. } | BatchOp::Delete { partition, .. } => *partition,
        }
    }
}

/// Ordered list of writes applied atomically by [`KvEngine::write`].
///
/// Later operations on the same key win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put
    pub fn put(&mut self, partition: PartitionId, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put {
            partition,
            key,
            value,
        });
    }

    /// Queue a delete
    pub fn delete(&mut self, partition: PartitionId, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { partition, key });
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether no operations are queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queued operations in application order
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Consume the batch
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}
