//! Statistics collector implementation.

use crate::config::{CacheConfig, StatsFailurePolicy};
use crate::error::{CacheError, CacheResult};
use crate::object_cache::ObjectCache;
use crate::state::LoadState;
use async_trait::async_trait;
use metacat_core::{CachedObject, LoadMonitor, MetaContainer, Result, Row, RowStream};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Source of the batched statistics query for a container.
#[async_trait]
pub trait StatsRowSource<C: ?Sized>: Send + Sync {
    /// Open one query returning a statistics row per child object.
    /// With `total_size_only` the source may skip everything but sizes.
    async fn prepare_statistics(
        &self,
        container: &C,
        total_size_only: bool,
    ) -> Result<Box<dyn RowStream>>;
}

/// Applies statistics rows to already cached objects.
pub trait StatsApplier<E>: Send + Sync {
    /// Name of the object a statistics row describes
    fn stats_key(&self, row: &Row) -> Result<String>;

    /// Record the row's values on `entity`
    fn apply(&self, entity: &E, row: &Row, total_size_only: bool) -> Result<()>;
}

/// Result of [`StatisticsCollector::collect_object_statistics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Statistics were collected earlier; no query was issued
    AlreadyCollected,
    /// The statistics query ran
    Collected {
        /// Rows applied to a cached object
        applied: usize,
        /// Rows for unknown objects or rows that failed to apply
        skipped: usize,
    },
}

impl CollectOutcome {
    pub fn queried(&self) -> bool {
        matches!(self, CollectOutcome::Collected { .. })
    }
}

/// Writes the final collection state on every exit path, including a caller
/// dropping the future mid-query.
struct SettleState<'a> {
    state: &'a RwLock<LoadState>,
    outcome: LoadState,
}

impl Drop for SettleState<'_> {
    fn drop(&mut self) {
        *self.state.write() = self.outcome;
    }
}

/// Collects per-object statistics for one container with a single batched
/// query and remembers that it did so.
pub struct StatisticsCollector<C, E> {
    source: Arc<dyn StatsRowSource<C>>,
    applier: Arc<dyn StatsApplier<E>>,
    config: CacheConfig,
    state: RwLock<LoadState>,
    collect_lock: Mutex<()>,
    queries: AtomicU64,
}

impl<C, E> StatisticsCollector<C, E>
where
    C: MetaContainer + 'static,
    E: CachedObject,
{
    pub fn new(
        source: Arc<dyn StatsRowSource<C>>,
        applier: Arc<dyn StatsApplier<E>>,
        config: CacheConfig,
    ) -> Self {
        Self {
            source,
            applier,
            config,
            state: RwLock::new(LoadState::NotLoaded),
            collect_lock: Mutex::new(()),
            queries: AtomicU64::new(0),
        }
    }

    pub fn is_collected(&self) -> bool {
        self.state.read().is_loaded()
    }

    pub fn state(&self) -> LoadState {
        *self.state.read()
    }

    /// Statistics queries issued since creation
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Forget that statistics were collected; the next call queries again
    pub fn reset(&self) {
        *self.state.write() = LoadState::NotLoaded;
        tracing::debug!("statistics collection state reset");
    }

    /// Collect statistics for every object of `container` held by `objects`.
    ///
    /// Runs at most once until [`reset`](Self::reset) unless `force_refresh`
    /// is set. Objects are enumerated through the cache, which loads them if
    /// needed; rows naming objects the cache does not know are skipped.
    #[tracing::instrument(
        skip_all,
        fields(
            container = %container.container_name(),
            total_size_only = total_size_only,
            force_refresh = force_refresh
        )
    )]
    pub async fn collect_object_statistics(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        objects: &dyn ObjectCache<C, E>,
        total_size_only: bool,
        force_refresh: bool,
    ) -> CacheResult<CollectOutcome> {
        if !force_refresh && self.is_collected() {
            tracing::debug!("statistics already collected");
            return Ok(CollectOutcome::AlreadyCollected);
        }

        let _guard = self.collect_lock.lock().await;
        if !force_refresh && self.is_collected() {
            return Ok(CollectOutcome::AlreadyCollected);
        }

        let mut settle = SettleState {
            state: &self.state,
            outcome: match self.config.statistics_failure {
                StatsFailurePolicy::Retry => LoadState::NotLoaded,
                StatsFailurePolicy::MarkCollected => LoadState::Loaded,
            },
        };
        *self.state.write() = LoadState::Loading;

        match self
            .collect(monitor, container, objects, total_size_only)
            .await
        {
            Ok((applied, skipped)) => {
                settle.outcome = LoadState::Loaded;
                tracing::debug!(applied, skipped, "collected object statistics");
                Ok(CollectOutcome::Collected { applied, skipped })
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    policy = ?self.config.statistics_failure,
                    "statistics collection failed"
                );
                Err(CacheError::Statistics {
                    container: container.container_name(),
                    source: Box::new(err),
                })
            }
        }
    }

    async fn collect(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        objects: &dyn ObjectCache<C, E>,
        total_size_only: bool,
    ) -> CacheResult<(usize, usize)> {
        let container_name = container.container_name();
        let known = objects.get_objects(monitor, container).await?;
        tracing::trace!(objects = known.len(), "enumerated objects for statistics");

        self.queries.fetch_add(1, Ordering::Relaxed);
        let mut stream = self
            .source
            .prepare_statistics(container, total_size_only)
            .await
            .map_err(|e| CacheError::prepare(&container_name, e))?;

        let (mut applied, mut skipped) = (0, 0);
        loop {
            if monitor.is_cancelled() {
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

            let key = match self.applier.stats_key(&row) {
                Ok(key) => key,
                Err(err) => {
                    skipped += 1;
                    tracing::warn!(
                        container = %container_name,
                        error = %err,
                        "statistics row without object name, skipping it"
                    );
                    continue;
                }
            };
            let Some(entity) = objects.get_cached_object(&key) else {
                skipped += 1;
                tracing::trace!(
                    container = %container_name,
                    name = %key,
                    "statistics for unknown object, skipping"
                );
                continue;
            };
            match self.applier.apply(&entity, &row, total_size_only) {
                Ok(()) => applied += 1,
                Err(err) => {
                    skipped += 1;
                    tracing::warn!(
                        container = %container_name,
                        name = %key,
                        error = %err,
                        "failed to apply statistics row"
                    );
                }
            }
        }
        Ok((applied, skipped))
    }
}
