//! metacat cache - lazily loaded metadata caches
//!
//! This crate provides:
//! - `LookupCache` - container -> name-indexed child objects
//! - `CompositeCache` - container -> entities with ordered sub-items, built in
//!   one pass over a grouped result
//! - `StatisticsCollector` - one batched statistics query per container
//! - The factory traits a metadata provider implements for each of them

mod config;
mod error;
mod factory;
mod index;
mod object_cache;
mod state;

pub mod composite;
pub mod lookup;
pub mod statistics;

#[cfg(test)]
mod testing;

pub use config::{CacheConfig, NameCase, StatsFailurePolicy};
pub use error::{CacheError, CacheResult};
pub use factory::{AttachCallback, CompositeFactory, EntityFactory, RowKey, SubItemFactory};
pub use object_cache::ObjectCache;
pub use state::{CacheStats, LoadState};

pub use composite::CompositeCache;
pub use lookup::LookupCache;

// Re-export statistics types for convenience
pub use statistics::{CollectOutcome, StatisticsCollector, StatsApplier, StatsRowSource};

// Re-export the core contract that providers implement alongside the factories
pub use metacat_core::{
    CachedObject, CatalogError, LoadMonitor, MetaContainer, QueryOptions, Row, RowSource,
    RowStream,
};
