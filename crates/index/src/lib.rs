//! Multi-index record collections over an ordered key-value engine
//!
//! A [`Collection`] stores records of one type in a primary partition keyed
//! by record ID and keeps any number of secondary indices alongside it, each
//! in its own partition. Reading goes through [`IndexView`]s, which hand out
//! STL-style bidirectional [`IndexIter`]s positioned by `find`,
//! `lower_bound`, `upper_bound`, `equal_range` and `range`.
//!
//! Records read through any index of a collection resolve to one shared
//! instance per ID, kept by the [`ObjectCache`]. Two iterators over different
//! indices that land on the same record hand out the same `Arc`.
//!
//! # Modules
//!
//! - `record`: the [`Record`] trait and secondary index declarations
//! - `cache`: identity map and bounded retention
//! - `iter`: [`IndexIter`], the cursor-backed iterator
//! - `view`: [`IndexView`] searches and the [`Walk`] adapter
//! - `collection`: [`CollectionBuilder`] and the write path
//! - `stats`: read-path counters

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod collection;
mod context;
pub mod iter;
pub mod record;
pub mod stats;
mod version;
pub mod view;

pub use cache::{ObjectCache, RetentionPolicy};
pub use collection::{
    validate_collection_name, validate_index_name, Collection, CollectionBuilder, PRIMARY_INDEX,
};
pub use iter::{IndexIter, Position};
pub use record::{IndexKey, IndexKind, Record, SecondaryIndex, Uniqueness};
pub use stats::{IndexStats, StatsSnapshot};
pub use view::{IndexView, Walk};

pub use strata_core::{FirstField, IndexConfig, IndexError, IndexResult, KeyCompare, OrdLess};
