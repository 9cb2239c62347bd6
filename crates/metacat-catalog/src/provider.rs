use crate::{Schema, Table};
use metacat_cache::StatsRowSource;
use metacat_core::RowSource;
use std::sync::Arc;

/// Catalog queries of a remote metadata provider.
///
/// Each source answers for one container. Filtered queries
/// ([`QueryOptions::object_name`](metacat_core::QueryOptions)) match on the
/// table name for [`tables`](Self::tables), on the column name for
/// [`columns`](Self::columns) and on the constraint name for
/// [`foreign_keys`](Self::foreign_keys). Sources that cannot filter return
/// `false` from `supports_object_filter`.
pub trait CatalogProvider: Send + Sync {
    /// Tables of a schema, one row each
    fn tables(&self) -> Arc<dyn RowSource<Schema>>;

    /// Columns of a table, one row each
    fn columns(&self) -> Arc<dyn RowSource<Table>>;

    /// Foreign key columns of a table, ordered by constraint name and key
    /// position
    fn foreign_keys(&self) -> Arc<dyn RowSource<Table>>;

    /// Size and row count of every table of a schema
    fn table_statistics(&self) -> Arc<dyn StatsRowSource<Schema>>;
}
