//! Single-level lookup cache
//!
//! Maps a container to a deduplicated, name-addressable set of child objects
//! loaded with a single query.

mod cache;

pub use cache::LookupCache;
