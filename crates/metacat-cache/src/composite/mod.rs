//! Composite cache for entities assembled from several rows

mod cache;

pub use cache::CompositeCache;
