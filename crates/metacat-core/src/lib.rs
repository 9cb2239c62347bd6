//! metacat core - shared abstractions for the metadata caches
//!
//! This crate provides the types every other metacat crate depends on:
//!
//! - `RowSource` / `RowStream` - the query contract a metadata provider implements
//! - `MetaContainer` / `CachedObject` - what owns a cache and what it holds
//! - `LoadMonitor` - cooperative cancellation and progress counters
//! - `Value`, `Row` and `CatalogError`

mod error;
mod monitor;
mod row_source;
mod types;

pub use error::*;
pub use monitor::*;
pub use row_source::*;
pub use types::*;
