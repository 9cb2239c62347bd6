//! metacat catalog - relational catalog model on top of the metadata caches
//!
//! This crate provides:
//! - `Schema` - tables of a schema and their batched statistics
//! - `Table` - columns and foreign keys of a table
//! - `CatalogProvider` - the catalog queries a remote database answers
//! - Row decoders for each object, reading the column names in [`fields`]

mod column;
pub mod fields;
mod foreign_key;
mod provider;
mod schema;
mod statistics;
mod table;

pub use column::Column;
pub use foreign_key::{ForeignKey, ForeignKeyAction, ForeignKeyColumn};
pub use provider::CatalogProvider;
pub use schema::Schema;
pub use statistics::TableStatistics;
pub use table::{Table, TableKind};
