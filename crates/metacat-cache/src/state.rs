//! Load state tracking shared by the caches and the statistics collector

use std::sync::atomic::{AtomicU64, Ordering};

/// Where a cache (or a statistics pass) stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing loaded yet, or reset by `clear`
    #[default]
    NotLoaded,
    /// A load is in flight
    Loading,
    /// The whole container has been loaded
    Loaded,
}

impl LoadState {
    /// Check if this state is loaded
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded)
    }

    /// Check if a load is in flight
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    /// Check if nothing has been loaded
    pub fn is_not_loaded(&self) -> bool {
        matches!(self, LoadState::NotLoaded)
    }
}

/// Snapshot of a cache for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of materialized objects
    pub objects: usize,
    /// Whether the whole container has been loaded
    pub fully_loaded: bool,
    /// Queries prepared by this cache since creation
    pub loads: u64,
    /// Rows read across all loads
    pub rows_read: u64,
    /// Rows dropped because they could not be resolved
    pub rows_skipped: u64,
}

/// Running totals behind [`CacheStats`]
#[derive(Debug, Default)]
pub(crate) struct LoadCounters {
    loads: AtomicU64,
    rows_read: AtomicU64,
    rows_skipped: AtomicU64,
}

impl LoadCounters {
    pub(crate) fn load_started(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn row_read(&self) {
        self.rows_read.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn row_skipped(&self) {
        self.rows_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, objects: usize, fully_loaded: bool) -> CacheStats {
        CacheStats {
            objects,
            fully_loaded,
            loads: self.loads.load(Ordering::Relaxed),
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
        }
    }
}
