//! Collections: one primary index plus any number of secondaries
//!
//! A [`Collection`] owns the partitions of its indices and keeps them in step.
//! Every write goes out as one atomic [`WriteBatch`] touching the primary
//! partition and each affected secondary partition, so readers never observe
//! a record without its index entries.
//!
//! Partition naming:
//!
//! - primary: `{collection}`
//! - secondary: `{collection}/{index}`
//!
//! ```ignore
//! let mut builder = CollectionBuilder::new(engine, "accounts");
//! let by_name = builder.secondary("by_name", |a: &Account| a.name.clone())?;
//! let accounts = builder.build()?;
//!
//! accounts.insert(Account { id: 1, name: "b".into() })?;
//! let view = accounts.index(&by_name);
//! let it = view.find("b".to_string())?;
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use strata_core::{
    pack_key, pack_value, unpack_value, IndexConfig, IndexError, IndexResult, KeyCompare, OrdLess,
};
use strata_storage::{KvEngine, PartitionId, RawCursor, WriteBatch};

use crate::cache::{ObjectCache, RetentionPolicy};
use crate::context::IndexContext;
use crate::record::{
    IndexKey, IndexKind, IndexMaintainer, IndexTarget, Record, SecondaryIndex, Uniqueness,
};
use crate::stats::StatsSnapshot;
use crate::view::IndexView;

/// Separator between collection and index names in partition names.
const SEP: char = '/';

/// Name of the implicit primary index.
pub const PRIMARY_INDEX: &str = "primary";

// =============================================================================
// Validation
// =============================================================================

/// Validate a collection name.
pub fn validate_collection_name(name: &str) -> IndexResult<()> {
    if name.is_empty() {
        return Err(IndexError::Config("Collection name must not be empty".into()));
    }
    if name.contains(SEP) {
        return Err(IndexError::Config(format!(
            "Collection name '{}' must not contain '/'",
            name
        )));
    }
    Ok(())
}

/// Validate a secondary index name.
pub fn validate_index_name(name: &str) -> IndexResult<()> {
    if name.is_empty() {
        return Err(IndexError::Config("Index name must not be empty".into()));
    }
    if name.contains(SEP) {
        return Err(IndexError::Config(format!(
            "Index name '{}' must not contain '/'",
            name
        )));
    }
    if name == PRIMARY_INDEX {
        return Err(IndexError::Config(format!(
            "Index name '{}' is reserved",
            PRIMARY_INDEX
        )));
    }
    Ok(())
}

// =============================================================================
// Builder
// =============================================================================

/// Declares the indices of a collection and opens their partitions.
pub struct CollectionBuilder<E: KvEngine, V: Record> {
    engine: Arc<E>,
    name: String,
    config: IndexConfig,
    indices: Vec<Arc<dyn IndexMaintainer<V>>>,
}

impl<E: KvEngine, V: Record> CollectionBuilder<E, V> {
    /// Start declaring a collection named `name` on `engine`.
    pub fn new(engine: Arc<E>, name: impl Into<String>) -> Self {
        Self {
            engine,
            name: name.into(),
            config: IndexConfig::default(),
            indices: Vec::new(),
        }
    }

    /// Use `config` for every index of the collection
    pub fn config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    /// Declare a non-unique secondary index ordered by `K: Ord`.
    pub fn secondary<K>(
        &mut self,
        name: &str,
        extract: impl Fn(&V) -> K + Send + Sync + 'static,
    ) -> IndexResult<SecondaryIndex<V, K>>
    where
        K: IndexKey + Ord,
    {
        self.declare(name, Uniqueness::NonUnique, extract)
    }

    /// Declare a unique secondary index ordered by `K: Ord`.
    pub fn unique<K>(
        &mut self,
        name: &str,
        extract: impl Fn(&V) -> K + Send + Sync + 'static,
    ) -> IndexResult<SecondaryIndex<V, K>>
    where
        K: IndexKey + Ord,
    {
        self.declare(name, Uniqueness::Unique, extract)
    }

    /// Declare a secondary index with an explicit compare policy.
    ///
    /// The policy must agree with the byte order of `K`'s encoding: keys the
    /// policy orders `a < b` must encode to `pack(a) < pack(b)`.
    pub fn declare<K, C>(
        &mut self,
        name: &str,
        uniqueness: Uniqueness,
        extract: impl Fn(&V) -> K + Send + Sync + 'static,
    ) -> IndexResult<SecondaryIndex<V, K, C>>
    where
        K: IndexKey,
        C: KeyCompare<K>,
    {
        validate_collection_name(&self.name)?;
        validate_index_name(name)?;
        if self.indices.iter().any(|index| &*index.target().name == name) {
            return Err(IndexError::Config(format!(
                "Index '{}' declared twice on collection '{}'",
                name, self.name
            )));
        }

        let partition = self
            .engine
            .open_partition(&format!("{}{}{}", self.name, SEP, name))?;
        let index = SecondaryIndex::<V, K, C>::new(Arc::from(name), partition, uniqueness, extract);
        let erased: Arc<dyn IndexMaintainer<V>> = index.def.clone();
        self.indices.push(erased);

        tracing::debug!(
            target: "strata::index",
            collection = %self.name,
            index = %name,
            partition = %partition,
            unique = uniqueness == Uniqueness::Unique,
            "Declared secondary index"
        );
        Ok(index)
    }

    /// Open the primary partition and finish the collection.
    pub fn build(self) -> IndexResult<Collection<E, V>> {
        validate_collection_name(&self.name)?;
        let primary = self.engine.open_partition(&self.name)?;
        let name: Arc<str> = Arc::from(self.name.as_str());

        tracing::debug!(
            target: "strata::index",
            collection = %name,
            partition = %primary,
            secondaries = self.indices.len(),
            snapshot_reads = self.config.snapshot_reads,
            retain_capacity = self.config.retain_capacity,
            "Opened collection"
        );

        Ok(Collection {
            ctx: Arc::new(IndexContext::new(self.engine, self.config, primary, name)),
            indices: self.indices,
            writer: Mutex::new(()),
        })
    }
}

// =============================================================================
// Collection
// =============================================================================

/// A set of records reachable through a primary index and its secondaries.
///
/// Reads go through [`IndexView`]s and may run on any thread. Writes are
/// serialized per collection.
pub struct Collection<E: KvEngine, V: Record> {
    ctx: Arc<IndexContext<E, V>>,
    indices: Vec<Arc<dyn IndexMaintainer<V>>>,
    writer: Mutex<()>,
}

impl<E: KvEngine, V: Record> Collection<E, V> {
    /// Collection name, also the primary partition name
    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    /// Configuration shared by every index
    pub fn config(&self) -> &IndexConfig {
        &self.ctx.config
    }

    /// Backing engine
    pub fn engine(&self) -> &Arc<E> {
        &self.ctx.engine
    }

    /// Identity cache shared by every index
    pub fn cache(&self) -> &ObjectCache<V> {
        &self.ctx.cache
    }

    /// Retention layer over the cache
    pub fn retention(&self) -> &RetentionPolicy<V> {
        &self.ctx.retention
    }

    /// Current read-path counters
    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats.snapshot()
    }

    /// Partition holding the records
    pub fn primary_partition(&self) -> PartitionId {
        self.ctx.primary
    }

    /// Names of the declared secondary indices, in declaration order
    pub fn index_names(&self) -> Vec<&str> {
        self.indices
            .iter()
            .map(|index| &*index.target().name)
            .collect()
    }

    /// View of the primary index, ordered by record ID
    pub fn primary(&self) -> IndexView<E, V, V::Id, OrdLess> {
        let target = IndexTarget {
            name: Arc::from(PRIMARY_INDEX),
            partition: self.ctx.primary,
            kind: IndexKind::Primary,
        };
        IndexView::new(Arc::clone(&self.ctx), target, OrdLess)
    }

    /// View of a secondary index declared on this collection
    pub fn index<K, C>(&self, index: &SecondaryIndex<V, K, C>) -> IndexView<E, V, K, C>
    where
        K: IndexKey,
        C: KeyCompare<K>,
    {
        IndexView::new(
            Arc::clone(&self.ctx),
            index.def.target.clone(),
            index.compare.clone(),
        )
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look up a record by ID, through the cache.
    pub fn get(&self, id: &V::Id) -> IndexResult<Option<Arc<V>>> {
        self.ctx.load(id)
    }

    /// Whether a record with `id` is stored
    pub fn contains(&self, id: &V::Id) -> IndexResult<bool> {
        Ok(self
            .ctx
            .engine
            .get(self.ctx.primary, &pack_key(id), None)?
            .is_some())
    }

    /// Number of stored records. Walks the primary partition.
    pub fn len(&self) -> IndexResult<usize> {
        let mut cursor = self.ctx.engine.cursor(self.ctx.primary, None);
        cursor.seek_to_first();
        let mut n = 0;
        while cursor.valid() {
            n += 1;
            cursor.next();
        }
        cursor.status()?;
        Ok(n)
    }

    /// Whether no record is stored
    pub fn is_empty(&self) -> IndexResult<bool> {
        let mut cursor = self.ctx.engine.cursor(self.ctx.primary, None);
        cursor.seek_to_first();
        cursor.status()?;
        Ok(!cursor.valid())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a new record and its index entries.
    ///
    /// Fails with [`IndexError::DuplicateId`] if the ID is taken and with
    /// [`IndexError::UniqueViolation`] if a unique index already holds the
    /// record's key. Nothing is written on failure.
    pub fn insert(&self, value: V) -> IndexResult<Arc<V>> {
        let _guard = self.writer.lock();
        let id = value.id();
        let id_bytes = pack_key(&id);

        if self
            .ctx
            .engine
            .get(self.ctx.primary, &id_bytes, None)?
            .is_some()
        {
            return Err(IndexError::DuplicateId(format!("{:?}", id)));
        }
        for index in &self.indices {
            self.check_unique(index.as_ref(), &value, &id_bytes)?;
        }

        let mut batch = WriteBatch::new();
        batch.put(self.ctx.primary, id_bytes.clone(), pack_value(&value)?);
        for index in &self.indices {
            batch.put(
                index.target().partition,
                index.entry_key(&value),
                id_bytes.clone(),
            );
        }
        self.ctx.engine.write(batch)?;

        tracing::debug!(target: "strata::index", collection = %self.ctx.name, id = ?id, "Inserted record");
        Ok(self.ctx.refresh(value))
    }

    /// Delete a record and its index entries, returning the last instance.
    pub fn remove(&self, id: &V::Id) -> IndexResult<Arc<V>> {
        let _guard = self.writer.lock();
        let id_bytes = pack_key(id);
        let stored: V = self.read_stored(id, &id_bytes)?;

        let mut batch = WriteBatch::new();
        batch.delete(self.ctx.primary, id_bytes);
        for index in &self.indices {
            batch.delete(index.target().partition, index.entry_key(&stored));
        }
        self.ctx.engine.write(batch)?;

        let removed = self
            .ctx
            .cache
            .get(id)
            .unwrap_or_else(|| Arc::new(stored));
        self.ctx.evict(id);

        tracing::debug!(target: "strata::index", collection = %self.ctx.name, id = ?id, "Removed record");
        Ok(removed)
    }

    /// Apply `f` to a copy of the stored record and write the result back.
    ///
    /// Index entries whose key changed are moved. `f` must not change the
    /// record's ID ([`IndexError::IdChanged`]). Instances handed out before
    /// the call keep their old contents; later reads see the new instance.
    pub fn modify(&self, id: &V::Id, f: impl FnOnce(&mut V)) -> IndexResult<Arc<V>> {
        let _guard = self.writer.lock();
        let id_bytes = pack_key(id);
        let before: V = self.read_stored(id, &id_bytes)?;
        let mut after: V = self.read_stored(id, &id_bytes)?;
        f(&mut after);

        let new_id = after.id();
        if &new_id != id {
            return Err(IndexError::IdChanged {
                from: format!("{:?}", id),
                to: format!("{:?}", new_id),
            });
        }

        let mut moved = Vec::new();
        for index in &self.indices {
            let old_key = index.entry_key(&before);
            let new_key = index.entry_key(&after);
            if old_key != new_key {
                self.check_unique(index.as_ref(), &after, &id_bytes)?;
                moved.push((index.target().partition, old_key, new_key));
            }
        }

        let mut batch = WriteBatch::new();
        batch.put(self.ctx.primary, id_bytes.clone(), pack_value(&after)?);
        for (partition, old_key, new_key) in moved {
            batch.delete(partition, old_key);
            batch.put(partition, new_key, id_bytes.clone());
        }
        self.ctx.engine.write(batch)?;

        tracing::debug!(target: "strata::index", collection = %self.ctx.name, id = ?id, "Modified record");
        Ok(self.ctx.refresh(after))
    }

    fn read_stored(&self, id: &V::Id, id_bytes: &[u8]) -> IndexResult<V> {
        let bytes = self
            .ctx
            .engine
            .get(self.ctx.primary, id_bytes, None)?
            .ok_or_else(|| IndexError::NotFound(format!("{:?}", id)))?;
        Ok(unpack_value(&bytes)?)
    }

    /// Fail if a unique `index` maps `value`'s key to a record other than `id_bytes`.
    fn check_unique(
        &self,
        index: &dyn IndexMaintainer<V>,
        value: &V,
        id_bytes: &[u8],
    ) -> IndexResult<()> {
        let target = index.target();
        if target.kind != IndexKind::Secondary(Uniqueness::Unique) {
            return Ok(());
        }
        match self
            .ctx
            .engine
            .get(target.partition, &index.packed_key(value), None)?
        {
            Some(owner) if owner != id_bytes => Err(IndexError::UniqueViolation {
                index: target.name.to_string(),
                key: index.describe_key(value),
            }),
            _ => Ok(()),
        }
    }
}

impl<E: KvEngine, V: Record> fmt::Debug for Collection<E, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.ctx.name)
            .field("primary", &self.ctx.primary)
            .field("indices", &self.index_names())
            .field("cache", &self.ctx.cache)
            .finish()
    }
}
