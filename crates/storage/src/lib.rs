//! Storage layer for Strata multi-index collections
//!
//! - `engine`: the interface every ordered key-value engine provides
//!   (partitions, cursors, point lookups, snapshots, atomic batches)
//! - `memory`: [`MemoryEngine`], an ordered in-memory engine with
//!   copy-on-write snapshots
//!
//! The index layer is written against [`KvEngine`] only.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod memory;

pub use engine::{BatchOp, KvEngine, PartitionId, RawCursor, StorageResult, WriteBatch};
pub use memory::{EngineCounters, MemoryCursor, MemoryEngine, MemorySnapshot};
