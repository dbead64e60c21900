//! Records and index declarations
//!
//! A [`Record`] names its own identity (`IDFromValue`). A [`SecondaryIndex`]
//! names a key projection (`KeyFromValue`), a compare policy and whether keys
//! must be unique.
//!
//! # Entry layout
//!
//! | Partition | Key | Value |
//! |-----------|-----|-------|
//! | primary | `pack(id)` | `pack_value(record)` |
//! | unique secondary | `pack(key)` | `pack(id)` |
//! | non-unique secondary | `pack(key) ++ pack(id)` | `pack(id)` |
//!
//! Secondary partitions never hold the record itself. Every secondary read
//! resolves through the primary partition.

use std::fmt::{self, Debug};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::{pack_key, KeyCompare, KeyDecode, KeyEncode, OrdLess};
use strata_storage::PartitionId;

/// Bounds every index key type satisfies.
pub trait IndexKey: KeyEncode + KeyDecode + Clone + Debug + Send + Sync + 'static {}

impl<T> IndexKey for T where T: KeyEncode + KeyDecode + Clone + Debug + Send + Sync + 'static {}

/// A value stored in a collection.
///
/// `id()` must be a pure projection: the same record always yields the same
/// ID, and two records with equal IDs are the same record for caching.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Primary identity
    type Id: IndexKey + Ord + Eq + Hash;

    /// Project the record's identity
    fn id(&self) -> Self::Id;
}

/// Whether a secondary index admits several records per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uniqueness {
    /// At most one record per key
    Unique,
    /// Any number of records per key
    NonUnique,
}

/// Which partition layout an index uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Keyed by record ID, holds the record
    Primary,
    /// Keyed by a projection, holds the record ID
    Secondary(Uniqueness),
}

/// Location and layout of one index, carried by views and iterators.
#[derive(Debug, Clone)]
pub(crate) struct IndexTarget {
    pub(crate) name: Arc<str>,
    pub(crate) partition: PartitionId,
    pub(crate) kind: IndexKind,
}

type Extractor<V, K> = Box<dyn Fn(&V) -> K + Send + Sync>;

pub(crate) struct SecondaryDef<V, K> {
    pub(crate) target: IndexTarget,
    extract: Extractor<V, K>,
}

impl<V, K: KeyEncode> SecondaryDef<V, K> {
    fn entry_key_for(&self, key: &K, id: &impl KeyEncode) -> Vec<u8> {
        let mut bytes = pack_key(key);
        if self.target.kind == IndexKind::Secondary(Uniqueness::NonUnique) {
            id.encode_key(&mut bytes);
        }
        bytes
    }
}

/// Handle to a declared secondary index.
///
/// Returned by the collection builder and passed back to
/// [`Collection::index`](crate::Collection::index) to obtain a view.
pub struct SecondaryIndex<V, K, C = OrdLess> {
    pub(crate) def: Arc<SecondaryDef<V, K>>,
    pub(crate) compare: C,
}

impl<V, K, C: Clone> Clone for SecondaryIndex<V, K, C> {
    fn clone(&self) -> Self {
        Self {
            def: Arc::clone(&self.def),
            compare: self.compare.clone(),
        }
    }
}

impl<V, K, C> Debug for SecondaryIndex<V, K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondaryIndex")
            .field("name", &self.def.target.name)
            .field("partition", &self.def.target.partition)
            .field("kind", &self.def.target.kind)
            .finish()
    }
}

impl<V: Record, K: IndexKey, C: KeyCompare<K>> SecondaryIndex<V, K, C> {
    pub(crate) fn new(
        name: Arc<str>,
        partition: PartitionId,
        uniqueness: Uniqueness,
        extract: impl Fn(&V) -> K + Send + Sync + 'static,
    ) -> Self {
        Self {
            def: Arc::new(SecondaryDef {
                target: IndexTarget {
                    name,
                    partition,
                    kind: IndexKind::Secondary(uniqueness),
                },
                extract: Box::new(extract),
            }),
            compare: C::default(),
        }
    }

    /// Index name
    pub fn name(&self) -> &str {
        &self.def.target.name
    }

    /// Partition holding the index entries
    pub fn partition(&self) -> PartitionId {
        self.def.target.partition
    }

    /// Whether keys are unique
    pub fn uniqueness(&self) -> Uniqueness {
        match self.def.target.kind {
            IndexKind::Secondary(u) => u,
            IndexKind::Primary => Uniqueness::Unique,
        }
    }

    /// Project a record's key for this index
    pub fn key_of(&self, value: &V) -> K {
        (self.def.extract)(value)
    }
}

/// Type-erased write-side view of a secondary index.
pub(crate) trait IndexMaintainer<V: Record>: Send + Sync {
    fn target(&self) -> &IndexTarget;

    /// Engine key of the entry for `value`
    fn entry_key(&self, value: &V) -> Vec<u8>;

    /// Packed logical key, without any ID suffix
    fn packed_key(&self, value: &V) -> Vec<u8>;

    /// Debug rendering of the logical key
    fn describe_key(&self, value: &V) -> String;
}

impl<V: Record, K: IndexKey> IndexMaintainer<V> for SecondaryDef<V, K> {
    fn target(&self) -> &IndexTarget {
        &self.target
    }

    fn entry_key(&self, value: &V) -> Vec<u8> {
        self.entry_key_for(&(self.extract)(value), &value.id())
    }

    fn packed_key(&self, value: &V) -> Vec<u8> {
        pack_key(&(self.extract)(value))
    }

    fn describe_key(&self, value: &V) -> String {
        format!("{:?}", (self.extract)(value))
    }
}

/// Marker tying a key type to a view without owning one.
pub(crate) type KeyMarker<K> = PhantomData<fn() -> K>;
