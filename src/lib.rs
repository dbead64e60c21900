//! Strata multi-index collections
//!
//! Records of one type stored in an ordered key-value engine and reachable
//! through a primary index and any number of secondary indices, each walked
//! with a bidirectional iterator. Every index of a collection hands out the
//! same shared instance for a given record.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use strata_multi_index::{CollectionBuilder, MemoryEngine};
//!
//! let engine = Arc::new(MemoryEngine::new());
//! let mut builder = CollectionBuilder::new(engine, "accounts");
//! let by_owner = builder.secondary("by_owner", |a: &Account| a.owner.clone())?;
//! let accounts = builder.build()?;
//!
//! accounts.insert(Account { id: 7, owner: "ada".into() })?;
//! for account in accounts.index(&by_owner).equal_iter("ada")? {
//!     println!("{:?}", account?);
//! }
//! ```
//!
//! # Crates
//!
//! - `strata-core`: key codec, compare policies, errors, configuration
//! - `strata-storage`: the engine interface and the in-memory engine
//! - `strata-index`: collections, views, iterators and the identity cache

#![warn(missing_docs)]

mod types;

pub use types::*;

/// Open a collection builder on a fresh in-memory engine.
pub fn in_memory<V: Record>(name: impl Into<String>) -> CollectionBuilder<MemoryEngine, V> {
    CollectionBuilder::new(std::sync::Arc::new(MemoryEngine::new()), name)
}
