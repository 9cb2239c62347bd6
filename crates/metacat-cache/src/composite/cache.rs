//! Two-level cache: container -> entities -> ordered sub-items
//!
//! One result set carries both levels. Rows arrive ordered by the entity key
//! and every run of rows sharing a key becomes one entity with the sub-items
//! contributed by those rows.

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::factory::{AttachCallback, CompositeFactory, EntityFactory, RowKey, SubItemFactory};
use crate::index::ObjectIndex;
use crate::object_cache::ObjectCache;
use crate::state::{CacheStats, LoadCounters, LoadState};
use async_trait::async_trait;
use indexmap::IndexMap;
use metacat_core::{CachedObject, LoadMonitor, MetaContainer, QueryOptions, Row, RowSource};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Slot of a sub-item contribution inside its entity group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PendingKey {
    Sub(String),
    /// Rows without a sub key are never deduplicated
    Row(usize),
}

/// Entity currently being assembled
struct Group<E, S> {
    key: String,
    /// `None` when the entity could not be built; the rest of the group is
    /// skipped
    entity: Option<E>,
    items: IndexMap<PendingKey, Vec<S>>,
    rows: usize,
}

impl<E, S> Group<E, S> {
    fn new(key: String, entity: Option<E>) -> Self {
        Self {
            key,
            entity,
            items: IndexMap::new(),
            rows: 0,
        }
    }
}

/// Composite cache for the children of one container
pub struct CompositeCache<C, E, S> {
    source: Arc<dyn RowSource<C>>,
    factory: Arc<dyn CompositeFactory<C, E, S>>,
    config: CacheConfig,
    index: RwLock<ObjectIndex<E>>,
    load_lock: Mutex<()>,
    counters: LoadCounters,
    _items: PhantomData<fn() -> S>,
}

impl<C, E, S> CompositeCache<C, E, S>
where
    C: MetaContainer + 'static,
    E: CachedObject,
    S: Send + 'static,
{
    pub fn new(
        source: Arc<dyn RowSource<C>>,
        factory: Arc<dyn CompositeFactory<C, E, S>>,
        config: CacheConfig,
    ) -> Self {
        Self {
            source,
            factory,
            index: RwLock::new(ObjectIndex::new(config.name_case)),
            config,
            load_lock: Mutex::new(()),
            counters: LoadCounters::default(),
            _items: PhantomData,
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

    fn lookup_resolved(&self, name: &str) -> Option<Option<Arc<E>>> {
        let index = self.index.read();
        match index.get(name) {
            Some(object) => Some(Some(object)),
            None if index.is_fully_loaded() => Some(None),
            None => None,
        }
    }

    /// All entities of the container with their sub-items attached
    #[tracing::instrument(skip_all, fields(container = %container.container_name()))]
    pub async fn get_objects(
        &self,
        monitor: &LoadMonitor,
        container: &C,
    ) -> CacheResult<Vec<Arc<E>>> {
        if let Some(objects) = self.loaded_objects() {
            tracing::debug!(count = objects.len(), "cache hit for composite objects");
            return Ok(objects);
        }

        let _guard = self.load_lock.lock().await;
        if let Some(objects) = self.loaded_objects() {
            return Ok(objects);
        }

        tracing::debug!("cache miss for composite objects, loading container");
        self.load_all(monitor, container).await?;
        Ok(self.get_cached_objects())
    }

    /// One entity by name. Loads only that entity's rows unless the cache is
    /// already fully loaded or the source cannot filter.
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

    /// Re-run the whole-container pass. Entities the source no longer reports
    /// are dropped once the pass completes.
    #[tracing::instrument(skip_all, fields(container = %container.container_name()))]
    pub async fn reload(&self, monitor: &LoadMonitor, container: &C) -> CacheResult<Vec<Arc<E>>> {
        let _guard = self.load_lock.lock().await;
        self.load_all(monitor, container).await?;
        Ok(self.get_cached_objects())
    }

    /// Rebuild one entity from the source; removes it if it is gone
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
            tracing::debug!("entity no longer reported by source, removed from cache");
        }
        Ok(refreshed)
    }

    /// Publish an entity built elsewhere; sub-items must already be attached
    pub fn cache_object(&self, object: E) -> Arc<E> {
        let object = Arc::new(object);
        self.index.write().insert(Arc::clone(&object));
        object
    }

    pub fn set_cache(&self, objects: impl IntoIterator<Item = E>) {
        let mut index = self.index.write();
        let mut staged = index.staging();
        for object in objects {
            staged.insert(Arc::new(object));
        }
        index.replace(staged);
    }

    pub fn invalidate_object(&self, name: &str) -> Option<Arc<E>> {
        let removed = self.index.write().remove(name);
        if removed.is_some() {
            tracing::debug!(name = %name, "invalidated cached entity");
        }
        removed
    }

    pub fn clear(&self) {
        let mut index = self.index.write();
        tracing::info!(objects = index.len(), "clearing composite cache");
        index.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let index = self.index.read();
        self.counters.snapshot(index.len(), index.is_fully_loaded())
    }

    /// Whole-container pass. Entities are published as soon as their group
    /// ends, so a failure keeps everything finalized before it; the
    /// fully-loaded flag is only set when the stream is exhausted.
    async fn load_all(&self, monitor: &LoadMonitor, container: &C) -> CacheResult<()> {
        let options = QueryOptions::all().with_fetch_size(self.config.fetch_size);
        let previous = self.index.write().begin_load();
        let mut reported = HashSet::new();

        match self
            .read_groups(monitor, container, &options, None, &mut reported)
            .await
        {
            Ok(published) => {
                let mut index = self.index.write();
                let dropped = index.retain_keys(&reported);
                index.mark_loaded();
                tracing::debug!(
                    count = published.len(),
                    dropped,
                    "loaded composite container"
                );
                Ok(())
            }
            Err(err) => {
                self.index.write().abort_load(previous);
                tracing::warn!(error = %err, "composite load failed, keeping finalized entities");
                Err(err)
            }
        }
    }

    async fn load_single(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        name: &str,
    ) -> CacheResult<Option<Arc<E>>> {
        let options = QueryOptions::single(name).with_fetch_size(self.config.fetch_size);
        let mut reported = HashSet::new();
        let published = self
            .read_groups(monitor, container, &options, Some(name), &mut reported)
            .await?;
        Ok(published.into_iter().last())
    }

    /// The grouping pass. `only` restricts the pass to one entity key; rows
    /// for other keys are ignored. Keys reported by the source are collected
    /// into `reported` (normalized).
    async fn read_groups(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        options: &QueryOptions,
        only: Option<&str>,
        reported: &mut HashSet<String>,
    ) -> CacheResult<Vec<Arc<E>>> {
        let container_name = container.container_name();
        let only = only.map(|name| self.config.name_case.normalize(name).into_owned());
        self.counters.load_started();
        let mut stream = self
            .source
            .prepare(container, options)
            .await
            .map_err(|e| CacheError::prepare(&container_name, e))?;

        let mut published = Vec::new();
        let mut current: Option<Group<E, S>> = None;
        loop {
            if monitor.is_cancelled() {
                if let Some(group) = &current {
                    tracing::debug!(
                        container = %container_name,
                        entity_key = %group.key,
                        "load cancelled, discarding unfinished entity"
                    );
                }
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

            let key = match self.factory.row_key(&row) {
                Ok(key) => key,
                Err(err) => {
                    self.counters.row_skipped();
                    tracing::warn!(
                        container = %container_name,
                        error = %err,
                        row = ?row.to_map(),
                        "failed to read row key, skipping row"
                    );
                    continue;
                }
            };

            let normalized = self.config.name_case.normalize(&key.entity_key).into_owned();
            if only.as_ref().is_some_and(|only| *only != normalized) {
                tracing::trace!(
                    container = %container_name,
                    entity_key = %key.entity_key,
                    "row for another entity in single-entity pass, ignoring"
                );
                continue;
            }

            let opens_group = current
                .as_ref()
                .is_none_or(|group| self.config.name_case.normalize(&group.key) != normalized);
            if opens_group {
                if let Some(done) = current.take() {
                    published.extend(self.finalize(monitor, &container_name, done));
                }
                if !reported.insert(normalized) {
                    tracing::warn!(
                        container = %container_name,
                        entity_key = %key.entity_key,
                        "entity key reappeared out of order, rebuilding entity"
                    );
                }
                current = Some(
                    self.open_group(monitor, container, &container_name, &key, &row)
                        .await,
                );
            }

            if let Some(group) = current.as_mut() {
                self.add_row(monitor, container, &container_name, group, key, &row)
                    .await;
            }
        }

        if let Some(done) = current.take() {
            published.extend(self.finalize(monitor, &container_name, done));
        }
        Ok(published)
    }

    /// Build the entity for a new key. Called once per group.
    async fn open_group(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        container_name: &str,
        key: &RowKey,
        row: &Row,
    ) -> Group<E, S> {
        let entity = match self.factory.fetch_object(monitor, container, row).await {
            Ok(Some(entity)) => Some(entity),
            Ok(None) => {
                tracing::trace!(
                    container = %container_name,
                    entity_key = %key.entity_key,
                    "entity skipped by factory"
                );
                None
            }
            Err(err) => {
                tracing::warn!(
                    container = %container_name,
                    entity_key = %key.entity_key,
                    error = %err,
                    "failed to build entity, skipping its rows"
                );
                None
            }
        };
        Group::new(key.entity_key.clone(), entity)
    }

    async fn add_row(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        container_name: &str,
        group: &mut Group<E, S>,
        key: RowKey,
        row: &Row,
    ) {
        let slot = match key.sub_key {
            Some(sub_key) => PendingKey::Sub(sub_key),
            None => PendingKey::Row(group.rows),
        };
        group.rows += 1;

        let Some(entity) = group.entity.as_ref() else {
            self.counters.row_skipped();
            return;
        };

        let items = match self
            .factory
            .fetch_object_row(monitor, container, entity, row)
            .await
        {
            Ok(Some(items)) => items,
            Ok(None) => {
                self.counters.row_skipped();
                tracing::warn!(
                    container = %container_name,
                    entity_key = %group.key,
                    sub_key = ?slot,
                    "sub-item row could not be resolved, skipping it"
                );
                return;
            }
            Err(err) => {
                self.counters.row_skipped();
                tracing::warn!(
                    container = %container_name,
                    entity_key = %group.key,
                    sub_key = ?slot,
                    error = %err,
                    "failed to resolve sub-item row, skipping it"
                );
                return;
            }
        };

        if matches!(slot, PendingKey::Sub(_)) && group.items.contains_key(&slot) {
            tracing::warn!(
                container = %container_name,
                entity_key = %group.key,
                sub_key = ?slot,
                "duplicate sub-item key, keeping the last row"
            );
        }
        // Replacing keeps the slot of the first occurrence
        group.items.insert(slot, items);
    }

    /// Attach the pending sub-items and publish the entity
    fn finalize(
        &self,
        monitor: &LoadMonitor,
        container_name: &str,
        group: Group<E, S>,
    ) -> Option<Arc<E>> {
        let mut entity = group.entity?;
        let items: Vec<S> = group.items.into_values().flatten().collect();
        let count = items.len();
        self.factory.attach_sub_items(&mut entity, items);

        let entity = Arc::new(entity);
        self.index.write().insert(Arc::clone(&entity));
        monitor.object_loaded();
        tracing::trace!(
            container = %container_name,
            entity_key = %group.key,
            items = count,
            "published entity"
        );
        Some(entity)
    }
}

#[async_trait]
impl<C, E, S> ObjectCache<C, E> for CompositeCache<C, E, S>
where
    C: MetaContainer + 'static,
    E: CachedObject,
    S: Send + 'static,
{
    fn get_cached_objects(&self) -> Vec<Arc<E>> {
        CompositeCache::get_cached_objects(self)
    }

    fn get_cached_object(&self, name: &str) -> Option<Arc<E>> {
        CompositeCache::get_cached_object(self, name)
    }

    async fn get_objects(
        &self,
        monitor: &LoadMonitor,
        container: &C,
    ) -> CacheResult<Vec<Arc<E>>> {
        CompositeCache::get_objects(self, monitor, container).await
    }

    async fn get_object(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        name: &str,
    ) -> CacheResult<Option<Arc<E>>> {
        CompositeCache::get_object(self, monitor, container, name).await
    }

    fn is_fully_loaded(&self) -> bool {
        CompositeCache::is_fully_loaded(self)
    }

    fn invalidate_object(&self, name: &str) -> Option<Arc<E>> {
        CompositeCache::invalidate_object(self, name)
    }

    fn clear(&self) {
        CompositeCache::clear(self)
    }

    fn stats(&self) -> CacheStats {
        CompositeCache::stats(self)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
