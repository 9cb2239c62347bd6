use crate::statistics::TableStatisticsApplier;
use crate::table::TableFactory;
use crate::{CatalogProvider, ForeignKey, Table};
use metacat_cache::{CacheConfig, CacheResult, CollectOutcome, LookupCache, StatisticsCollector};
use metacat_core::{LoadMonitor, MetaContainer};
use std::sync::Arc;

/// Schema of a remote database: the root container of the catalog model.
///
/// Tables are loaded lazily through the provider's table query; their
/// statistics are collected in one batch on request.
pub struct Schema {
    name: String,
    tables: LookupCache<Schema, Table>,
    table_statistics: StatisticsCollector<Schema, Table>,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("tables", &self.tables.stats())
            .field("statistics", &self.table_statistics.state())
            .finish()
    }
}

impl Schema {
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn CatalogProvider>,
        config: CacheConfig,
    ) -> Self {
        let tables = LookupCache::new(
            provider.tables(),
            Arc::new(TableFactory::new(Arc::clone(&provider), config.clone())),
            config.clone(),
        );
        let table_statistics = StatisticsCollector::new(
            provider.table_statistics(),
            Arc::new(TableStatisticsApplier),
            config,
        );
        Self {
            name: name.into(),
            tables,
            table_statistics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn tables(&self, monitor: &LoadMonitor) -> CacheResult<Vec<Arc<Table>>> {
        self.tables.get_objects(monitor, self).await
    }

    pub async fn table(&self, monitor: &LoadMonitor, name: &str) -> CacheResult<Option<Arc<Table>>> {
        self.tables.get_object(monitor, self, name).await
    }

    /// Tables loaded so far, without querying
    pub fn cached_tables(&self) -> Vec<Arc<Table>> {
        self.tables.get_cached_objects()
    }

    pub fn table_cache(&self) -> &LookupCache<Schema, Table> {
        &self.tables
    }

    /// Table a foreign key points at, when it lives in this schema
    pub async fn referenced_table(
        &self,
        monitor: &LoadMonitor,
        foreign_key: &ForeignKey,
    ) -> CacheResult<Option<Arc<Table>>> {
        if let Some(schema) = foreign_key
            .referenced_schema
            .as_deref()
            .filter(|schema| *schema != self.name)
        {
            tracing::debug!(
                foreign_key = %foreign_key.name,
                referenced_schema = %schema,
                "foreign key references another schema"
            );
            return Ok(None);
        }
        self.table(monitor, &foreign_key.referenced_table).await
    }

    /// Collect row counts and sizes for every table of the schema.
    ///
    /// Runs one statistics query; later calls return
    /// [`CollectOutcome::AlreadyCollected`] until `force_refresh` is set or
    /// the schema is refreshed.
    pub async fn collect_table_statistics(
        &self,
        monitor: &LoadMonitor,
        total_size_only: bool,
        force_refresh: bool,
    ) -> CacheResult<CollectOutcome> {
        self.table_statistics
            .collect_object_statistics(monitor, self, &self.tables, total_size_only, force_refresh)
            .await
    }

    pub fn has_table_statistics(&self) -> bool {
        self.table_statistics.is_collected()
    }

    /// Forget every cached table and the collected statistics
    pub fn refresh(&self) {
        tracing::info!(schema = %self.name, "refreshing schema metadata");
        self.tables.clear();
        self.table_statistics.reset();
    }
}

impl MetaContainer for Schema {
    fn container_name(&self) -> String {
        self.name.clone()
    }
}
