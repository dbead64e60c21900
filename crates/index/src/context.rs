//! State shared by every view and iterator of one collection

use std::sync::Arc;

use strata_core::{pack_key, unpack_value, IndexConfig, IndexResult};
use strata_storage::{KvEngine, PartitionId};

use crate::cache::{ObjectCache, RetentionPolicy};
use crate::record::Record;
use crate::stats::IndexStats;
use crate::version::{ReadPin, VersionLog};

pub(crate) struct IndexContext<E: KvEngine, V: Record> {
    pub(crate) engine: Arc<E>,
    pub(crate) cache: ObjectCache<V>,
    pub(crate) retention: RetentionPolicy<V>,
    pub(crate) stats: IndexStats,
    versions: Arc<VersionLog<V::Id>>,
    pub(crate) config: IndexConfig,
    pub(crate) primary: PartitionId,
    pub(crate) name: Arc<str>,
}

impl<E: KvEngine, V: Record> IndexContext<E, V> {
    pub(crate) fn new(
        engine: Arc<E>,
        config: IndexConfig,
        primary: PartitionId,
        name: Arc<str>,
    ) -> Self {
        Self {
            engine,
            cache: ObjectCache::new(),
            retention: RetentionPolicy::new(config.retain_capacity),
            stats: IndexStats::default(),
            versions: Arc::new(VersionLog::new()),
            config,
            primary,
            name,
        }
    }

    /// Account for a dereference served by a live instance.
    pub(crate) fn hit(&self, record: Arc<V>) -> Arc<V> {
        self.stats.record_hit();
        self.retention.touch(&record);
        record
    }

    /// Pin the published write version before opening an engine view.
    pub(crate) fn pin(&self) -> ReadPin<V::Id> {
        self.versions.pin()
    }

    /// Resolve `id` for a reader whose view was opened under `pin`.
    ///
    /// `decode` produces the record as that view stores it. If the record was
    /// written after the pin, the decoded copy is returned outside the cache
    /// so the newer canonical instance (or its absence) stands.
    pub(crate) fn resolve(
        &self,
        id: &V::Id,
        pin: &ReadPin<V::Id>,
        decode: impl FnOnce() -> IndexResult<V>,
    ) -> IndexResult<Arc<V>> {
        // Cache first: a writer stamps before replacing, so seeing its
        // instance implies seeing its stamp
        let cached = self.cache.get(id);
        if self.versions.written_since(id, pin.version()) {
            return Ok(self.superseded(decode()?));
        }
        match cached {
            Some(record) => Ok(self.hit(record)),
            None => Ok(self.install(decode()?, pin)),
        }
    }

    /// Install a decoded record and return the canonical instance.
    ///
    /// A record written after `pin` is returned uncached.
    fn install(&self, value: V, pin: &ReadPin<V::Id>) -> Arc<V> {
        let pinned = pin.version();
        match self
            .cache
            .cache_unless(value, |id| self.versions.written_since(id, pinned))
        {
            Ok(record) => {
                self.stats.record_miss();
                self.retention.touch(&record);
                tracing::trace!(target: "strata::index", collection = %self.name, id = ?record.id(), "Installed record");
                record
            }
            Err(value) => self.superseded(value),
        }
    }

    fn superseded(&self, value: V) -> Arc<V> {
        self.stats.record_stale_read();
        tracing::trace!(target: "strata::index", collection = %self.name, id = ?value.id(), "Serving superseded record uncached");
        Arc::new(value)
    }

    /// Resolve an ID through the cache, falling back to the primary partition.
    ///
    /// Reads the live engine state, not a snapshot. Never returns an instance
    /// older than the last completed write.
    pub(crate) fn load(&self, id: &V::Id) -> IndexResult<Option<Arc<V>>> {
        let pin = self.pin();
        if let Some(record) = self.cache.get(id) {
            if !self.versions.written_since(id, pin.version()) {
                return Ok(Some(self.hit(record)));
            }
        }
        match self.engine.get(self.primary, &pack_key(id), None)? {
            Some(bytes) => Ok(Some(self.install(unpack_value(&bytes)?, &pin))),
            None => Ok(None),
        }
    }

    /// Drop a removed record from the cache and the retention set.
    ///
    /// Callers hold the writer lock and have already committed the removal.
    pub(crate) fn evict(&self, id: &V::Id) {
        let version = self.versions.stamp(id.clone());
        self.cache.invalidate(id);
        self.retention.forget(id);
        self.versions.publish(version);
    }

    /// Make `value` the canonical instance after a committed write.
    ///
    /// Callers hold the writer lock.
    pub(crate) fn refresh(&self, value: V) -> Arc<V> {
        let version = self.versions.stamp(value.id());
        let record = self.cache.replace(value);
        self.retention.touch(&record);
        self.versions.publish(version);
        record
    }
}
