use crate::error::CacheResult;
use crate::state::CacheStats;
use async_trait::async_trait;
use metacat_core::LoadMonitor;
use std::sync::Arc;

/// Read and invalidation surface shared by [`LookupCache`](crate::LookupCache)
/// and [`CompositeCache`](crate::CompositeCache).
///
/// A cache belongs to exactly one container; the container is passed to the
/// loading methods so the cache can hand it to its row source.
#[async_trait]
pub trait ObjectCache<C, E>: Send + Sync {
    /// Objects materialized so far, in first-seen order. Never loads.
    fn get_cached_objects(&self) -> Vec<Arc<E>>;

    /// One materialized object by name. Never loads.
    fn get_cached_object(&self, name: &str) -> Option<Arc<E>>;

    /// All objects of the container, loading them on first use
    async fn get_objects(&self, monitor: &LoadMonitor, container: &C)
    -> CacheResult<Vec<Arc<E>>>;

    /// One object by name, loading only that object when the cache is not
    /// fully populated
    async fn get_object(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        name: &str,
    ) -> CacheResult<Option<Arc<E>>>;

    fn is_fully_loaded(&self) -> bool;

    /// Forget one object. Returns it if it was cached.
    fn invalidate_object(&self, name: &str) -> Option<Arc<E>>;

    /// Forget everything and reset the fully-loaded flag
    fn clear(&self);

    fn stats(&self) -> CacheStats;
}
