//! Public types for Strata multi-index collections.
//!
//! This module re-exports types from the internal crates with a single import path.

// ============================================================================
// Collections and indices
// ============================================================================

pub use strata_index::{Collection, CollectionBuilder, Record, SecondaryIndex, Uniqueness};
pub use strata_index::{IndexKind, IndexKey, PRIMARY_INDEX};

// Searching and iteration
pub use strata_index::{IndexIter, IndexView, Position, Walk};

// Identity cache and counters
pub use strata_index::{ObjectCache, RetentionPolicy, StatsSnapshot};

// ============================================================================
// Keys, ordering and configuration
// ============================================================================

pub use strata_core::{FirstField, KeyCompare, OrdLess};
pub use strata_core::{KeyDecode, KeyEncode};
pub use strata_core::IndexConfig;

// ============================================================================
// Errors
// ============================================================================

pub use strata_core::{CodecError, IndexError, IndexResult, StorageError};

// ============================================================================
// Engines
// ============================================================================

pub use strata_storage::{KvEngine, MemoryEngine, PartitionId, RawCursor, WriteBatch};
