//! Single-level cache: container -> deduplicated, name-indexed objects
//!
//! Objects are fetched with one query for the whole container, or with a
//! filtered query when only one name is requested and the cache has not been
//! fully populated yet.

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::factory::EntityFactory;
use crate::index::ObjectIndex;
use crate::object_cache::ObjectCache;
use crate::state::{CacheStats, LoadCounters, LoadState};
use async_trait::async_trait;
use metacat_core::{CachedObject, LoadMonitor, MetaContainer, QueryOptions, RowSource};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Lookup cache for the children of one container
pub struct LookupCache<C, E> {
    source: Arc<dyn RowSource<C>>,
    factory: Arc<dyn EntityFactory<C, E>>,
    config: CacheConfig,
    index: RwLock<ObjectIndex<E>>,
    /// Serializes loads; reads of materialized state never take it
    load_lock: Mutex<()>,
    counters: LoadCounters,
}

impl<C, E> LookupCache<C, E>
where
    C: MetaContainer + 'static,
    E: CachedObject,
{
    pub fn new(
        source: Arc<dyn RowSource<C>>,
        factory: Arc<dyn EntityFactory<C, E>>,
        config: CacheConfig,
    ) -> Self {
        Self {
            source,
            factory,
            index: RwLock::new(ObjectIndex::new(config.name_case)),
            config,
            load_lock: Mutex::new(()),
            counters: LoadCounters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get_cached_objects(&self) -> Vec<Arc<E>> {
        self.index.read().values()
    }

    pub fn get_cached_object(&self, name: &str) -> Option<Arc<E>> {
        self.index.read().get(name)
    }

    pub fn is_fully_loaded(&self) -> bool {
        self.index.read().is_fully_loaded()
    }

    pub fn load_state(&self) -> LoadState {
        self.index.read().state()
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn loaded_objects(&self) -> Option<Vec<Arc<E>>> {
        let index = self.index.read();
        index.is_fully_loaded().then(|| index.values())
    }

    /// All objects of the container. The first call queries the row source;
    /// later calls are served from memory until [`clear`](Self::clear).
    #[tracing::instrument(skip_all, fields(container = %container.container_name()))]
    pub async fn get_objects(
        &self,
        monitor: &LoadMonitor,
        container: &C,
    ) -> CacheResult<Vec<Arc<E>>> {
        if let Some(objects) = self.loaded_objects() {
            tracing::debug!(count = objects.len(), "cache hit for objects");
            return Ok(objects);
        }

        let _guard = self.load_lock.lock().await;
        // Another caller may have finished the load while we waited
        if let Some(objects) = self.loaded_objects() {
            tracing::debug!(count = objects.len(), "objects loaded by concurrent caller");
            return Ok(objects);
        }

        tracing::debug!("cache miss for objects, loading container");
        self.load_all(monitor, container).await?;
        Ok(self.get_cached_objects())
    }

    /// One object by name.
    ///
    /// Served locally when the object is already materialized or the cache is
    /// fully loaded (a miss is then authoritative). Otherwise a query filtered
    /// to `name` runs; it does not mark the container as fully loaded. Sources
    /// that cannot filter fall back to a full load.
    #[tracing::instrument(skip_all, fields(container = %container.container_name(), name = %name))]
    pub async fn get_object(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        name: &str,
    ) -> CacheResult<Option<Arc<E>>> {
        if let Some(object) = self.lookup_resolved(name) {
            return Ok(object);
        }

        let _guard = self.load_lock.lock().await;
        if let Some(object) = self.lookup_resolved(name) {
            return Ok(object);
        }

        if !self.source.supports_object_filter() {
            tracing::debug!("row source cannot filter by name, loading whole container");
            self.load_all(monitor, container).await?;
            return Ok(self.get_cached_object(name));
        }

        self.load_single(monitor, container, name).await
    }

    /// `Some(answer)` when `name` can be answered without a query
    fn lookup_resolved(&self, name: &str) -> Option<Option<Arc<E>>> {
        let index = self.index.read();
        match index.get(name) {
            Some(object) => {
                tracing::debug!("cache hit for object");
                Some(Some(object))
            }
            None if index.is_fully_loaded() => {
                tracing::debug!("object not present in fully loaded cache");
                Some(None)
            }
            None => None,
        }
    }

    /// Reload the whole container. Previously cached objects stay visible
    /// until the new result has been read completely; those still reported
    /// keep their instance, [`Self::refresh_object`] rebuilds one.
    #[tracing::instrument(skip_all, fields(container = %container.container_name()))]
    pub async fn reload(&self, monitor: &LoadMonitor, container: &C) -> CacheResult<Vec<Arc<E>>> {
        let _guard = self.load_lock.lock().await;
        self.load_all(monitor, container).await?;
        Ok(self.get_cached_objects())
    }

    /// Re-read one object from the source, replacing the cached instance.
    /// An object the source no longer reports is removed.
    #[tracing::instrument(skip_all, fields(container = %container.container_name(), name = %name))]
    pub async fn refresh_object(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        name: &str,
    ) -> CacheResult<Option<Arc<E>>> {
        let _guard = self.load_lock.lock().await;
        if !self.source.supports_object_filter() {
            self.load_all(monitor, container).await?;
            return Ok(self.get_cached_object(name));
        }

        let refreshed = self.load_single(monitor, container, name).await?;
        if refreshed.is_none() && self.index.write().remove(name).is_some() {
            tracing::debug!("object no longer reported by source, removed from cache");
        }
        Ok(refreshed)
    }

    /// Add or replace one object without querying, e.g. after the provider
    /// created it remotely
    pub fn cache_object(&self, object: E) -> Arc<E> {
        let object = Arc::new(object);
        if self.index.write().insert(Arc::clone(&object)).is_some() {
            tracing::debug!(name = %object.name(), "replaced cached object");
        }
        object
    }

    /// Populate the whole cache from objects obtained elsewhere and mark it
    /// fully loaded
    pub fn set_cache(&self, objects: impl IntoIterator<Item = E>) {
        let mut index = self.index.write();
        let mut staged = index.staging();
        for object in objects {
            let object = Arc::new(object);
            if staged.insert(Arc::clone(&object)).is_some() {
                tracing::warn!(name = %object.name(), "duplicate object name, keeping the last one");
            }
        }
        index.replace(staged);
    }

    pub fn invalidate_object(&self, name: &str) -> Option<Arc<E>> {
        let removed = self.index.write().remove(name);
        if removed.is_some() {
            tracing::debug!(name = %name, "invalidated cached object");
        }
        removed
    }

    pub fn clear(&self) {
        let mut index = self.index.write();
        tracing::info!(objects = index.len(), "clearing lookup cache");
        index.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let index = self.index.read();
        self.counters.snapshot(index.len(), index.is_fully_loaded())
    }

    /// Full load. Rows are staged and committed only when the stream is read
    /// to the end, so a failure leaves the previous state untouched. Objects
    /// already cached keep their instance. Callers hold `load_lock`.
    async fn load_all(&self, monitor: &LoadMonitor, container: &C) -> CacheResult<()> {
        let options = QueryOptions::all().with_fetch_size(self.config.fetch_size);
        let previous = self.index.write().begin_load();

        match self.read_objects(monitor, container, &options).await {
            Ok(staged) => {
                let count = staged.len();
                let kept = self.index.write().commit(staged);
                tracing::debug!(count, kept, "loaded container objects");
                Ok(())
            }
            Err(err) => {
                self.index.write().abort_load(previous);
                tracing::warn!(error = %err, "container load failed, keeping previous cache state");
                Err(err)
            }
        }
    }

    /// Filtered load of one name; upserts the result without touching the
    /// fully-loaded flag. Callers hold `load_lock`.
    async fn load_single(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        name: &str,
    ) -> CacheResult<Option<Arc<E>>> {
        let options = QueryOptions::single(name).with_fetch_size(self.config.fetch_size);
        let staged = self.read_objects(monitor, container, &options).await?;

        let mut index = self.index.write();
        let mut found = None;
        for object in staged.values() {
            if index.same_name(object.name(), name) {
                index.insert(Arc::clone(&object));
                found = Some(object);
            } else {
                tracing::debug!(
                    returned = %object.name(),
                    "filtered query returned another object, ignoring it"
                );
            }
        }
        Ok(found)
    }

    async fn read_objects(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        options: &QueryOptions,
    ) -> CacheResult<ObjectIndex<E>> {
        let container_name = container.container_name();
        self.counters.load_started();
        let mut stream = self
            .source
            .prepare(container, options)
            .await
            .map_err(|e| CacheError::prepare(&container_name, e))?;

        let mut staged = self.index.read().staging();
        loop {
            if monitor.is_cancelled() {
                tracing::debug!(container = %container_name, "load cancelled between rows");
                return Err(CacheError::Cancelled {
                    container: container_name,
                });
            }
            let Some(row) = stream
                .next()
                .await
                .map_err(|e| CacheError::iteration(&container_name, e))?
            else {
                break;
            };
            monitor.row_read();
            self.counters.row_read();

            match self.factory.fetch_object(monitor, container, &row).await {
                Ok(Some(object)) => {
                    let object = Arc::new(object);
                    if staged.insert(Arc::clone(&object)).is_some() {
                        tracing::warn!(
                            container = %container_name,
                            name = %object.name(),
                            "duplicate object name in result, keeping the last one"
                        );
                    }
                    monitor.object_loaded();
                }
                Ok(None) => {
                    self.counters.row_skipped();
                    tracing::trace!(container = %container_name, "row skipped by factory");
                }
                Err(err) => {
                    self.counters.row_skipped();
                    tracing::warn!(
                        container = %container_name,
                        error = %err,
                        row = ?row.to_map(),
                        "failed to resolve object row, skipping it"
                    );
                }
            }
        }
        Ok(staged)
    }
}

#[async_trait]
impl<C, E> ObjectCache<C, E> for LookupCache<C, E>
where
    C: MetaContainer + 'static,
    E: CachedObject,
{
    fn get_cached_objects(&self) -> Vec<Arc<E>> {
        LookupCache::get_cached_objects(self)
    }

    fn get_cached_object(&self, name: &str) -> Option<Arc<E>> {
        LookupCache::get_cached_object(self, name)
    }

    async fn get_objects(
        &self,
        monitor: &LoadMonitor,
        container: &C,
    ) -> CacheResult<Vec<Arc<E>>> {
        LookupCache::get_objects(self, monitor, container).await
    }

    async fn get_object(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        name: &str,
    ) -> CacheResult<Option<Arc<E>>> {
        LookupCache::get_object(self, monitor, container, name).await
    }

    fn is_fully_loaded(&self) -> bool {
        LookupCache::is_fully_loaded(self)
    }

    fn invalidate_object(&self, name: &str) -> Option<Arc<E>> {
        LookupCache::invalidate_object(self, name)
    }

    fn clear(&self) {
        LookupCache::clear(self)
    }

    fn stats(&self) -> CacheStats {
        LookupCache::stats(self)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
