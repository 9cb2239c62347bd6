use crate::column::ColumnFactory;
use crate::fields;
use crate::foreign_key::ForeignKeyFactory;
use crate::{CatalogProvider, Column, ForeignKey, ForeignKeyColumn, Schema, TableStatistics};
use async_trait::async_trait;
use metacat_cache::{CacheConfig, CacheResult, CompositeCache, EntityFactory, LookupCache};
use metacat_core::{CachedObject, CatalogError, LoadMonitor, MetaContainer, Result, Row};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Table type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    Table,
    View,
    MaterializedView,
    ForeignTable,
    Temporary,
    System,
}

impl TableKind {
    /// Parse the table type reported by a catalog (`BASE TABLE`, `VIEW`, ...)
    pub fn parse(table_type: &str) -> Option<Self> {
        match table_type.trim().to_ascii_uppercase().as_str() {
            "BASE TABLE" | "TABLE" => Some(Self::Table),
            "VIEW" => Some(Self::View),
            "MATERIALIZED VIEW" => Some(Self::MaterializedView),
            "FOREIGN" | "FOREIGN TABLE" => Some(Self::ForeignTable),
            "LOCAL TEMPORARY" | "GLOBAL TEMPORARY" | "TEMPORARY" => Some(Self::Temporary),
            "SYSTEM TABLE" | "SYSTEM VIEW" => Some(Self::System),
            _ => None,
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(self, Self::View | Self::MaterializedView)
    }
}

/// Table of a schema; owns the caches of its columns and foreign keys
pub struct Table {
    schema: String,
    name: String,
    kind: TableKind,
    comment: Option<String>,
    statistics: RwLock<Option<TableStatistics>>,
    columns: LookupCache<Table, Column>,
    foreign_keys: CompositeCache<Table, ForeignKey, ForeignKeyColumn>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("schema", &self.schema)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("columns", &self.columns.len())
            .field("foreign_keys", &self.foreign_keys.len())
            .finish()
    }
}

impl Table {
    pub(crate) fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        kind: TableKind,
        comment: Option<String>,
        provider: &dyn CatalogProvider,
        config: &CacheConfig,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            kind,
            comment,
            statistics: RwLock::new(None),
            columns: LookupCache::new(provider.columns(), Arc::new(ColumnFactory), config.clone()),
            foreign_keys: CompositeCache::new(
                provider.foreign_keys(),
                Arc::new(ForeignKeyFactory),
                config.clone(),
            ),
        }
    }

    /// Name of the owning schema
    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// `schema.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Statistics applied by the last collection, if any
    pub fn statistics(&self) -> Option<TableStatistics> {
        self.statistics.read().clone()
    }

    pub(crate) fn set_statistics(&self, statistics: TableStatistics) {
        *self.statistics.write() = Some(statistics);
    }

    pub async fn columns(&self, monitor: &LoadMonitor) -> CacheResult<Vec<Arc<Column>>> {
        self.columns.get_objects(monitor, self).await
    }

    pub async fn column(&self, monitor: &LoadMonitor, name: &str) -> CacheResult<Option<Arc<Column>>> {
        self.columns.get_object(monitor, self, name).await
    }

    pub fn cached_column(&self, name: &str) -> Option<Arc<Column>> {
        self.columns.get_cached_object(name)
    }

    /// Foreign keys with their columns resolved. The table's columns are
    /// loaded first; a failing column query fails the call and leaves the
    /// foreign key cache untouched.
    pub async fn foreign_keys(&self, monitor: &LoadMonitor) -> CacheResult<Vec<Arc<ForeignKey>>> {
        self.columns(monitor).await?;
        self.foreign_keys.get_objects(monitor, self).await
    }

    pub async fn foreign_key(
        &self,
        monitor: &LoadMonitor,
        name: &str,
    ) -> CacheResult<Option<Arc<ForeignKey>>> {
        self.columns(monitor).await?;
        self.foreign_keys.get_object(monitor, self, name).await
    }

    pub fn column_cache(&self) -> &LookupCache<Table, Column> {
        &self.columns
    }

    pub fn foreign_key_cache(&self) -> &CompositeCache<Table, ForeignKey, ForeignKeyColumn> {
        &self.foreign_keys
    }

    /// Drop cached columns and foreign keys; statistics stay until the next
    /// collection
    pub fn refresh(&self) {
        tracing::info!(table = %self.qualified_name(), "refreshing table metadata");
        self.foreign_keys.clear();
        self.columns.clear();
    }
}

impl CachedObject for Table {
    fn name(&self) -> &str {
        &self.name
    }
}

impl MetaContainer for Table {
    fn container_name(&self) -> String {
        self.qualified_name()
    }
}

/// Decodes table rows of [`CatalogProvider::tables`] and wires the new
/// table's caches to the provider
pub(crate) struct TableFactory {
    provider: Arc<dyn CatalogProvider>,
    config: CacheConfig,
}

impl TableFactory {
    pub(crate) fn new(provider: Arc<dyn CatalogProvider>, config: CacheConfig) -> Self {
        Self { provider, config }
    }
}

#[async_trait]
impl EntityFactory<Schema, Table> for TableFactory {
    async fn fetch_object(
        &self,
        _monitor: &LoadMonitor,
        schema: &Schema,
        row: &Row,
    ) -> Result<Option<Table>> {
        let name = row.str_field(fields::TABLE_NAME)?;
        let table_type = row.str_field(fields::TABLE_TYPE)?;
        let kind = TableKind::parse(table_type).ok_or_else(|| {
            CatalogError::invalid_field(fields::TABLE_TYPE, format!("unknown table type {table_type}"))
        })?;

        Ok(Some(Table::new(
            schema.name(),
            name,
            kind,
            row.opt_str_field(fields::TABLE_COMMENT)?.map(String::from),
            self.provider.as_ref(),
            &self.config,
        )))
    }
}
