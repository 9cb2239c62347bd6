//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use metacat_cache::StatsRowSource;
use metacat_catalog::{CatalogProvider, Schema, Table, fields};
use metacat_core::{
    CatalogError, MemoryRowStream, MetaContainer, QueryOptions, Result, Row, RowSource, RowStream,
    Value,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Initialize logging for tests if not already initialized
pub fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("metacat_cache=debug".parse().unwrap())
                    .add_directive("metacat_catalog=debug".parse().unwrap()),
            )
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Mock catalog query keyed by container name (`sales`, `sales.orders`).
///
/// Filtered queries keep rows whose `key_column` equals the requested name.
pub struct MockSource {
    pub key_column: &'static str,
    pub rows: parking_lot::Mutex<HashMap<String, Vec<Row>>>,
    pub should_fail: parking_lot::Mutex<bool>,
    /// `(container, options)` of every prepared query, for assertion in tests
    pub query_log: Arc<parking_lot::Mutex<Vec<(String, QueryOptions)>>>,
    /// `total_size_only` of every statistics query
    pub stats_requests: parking_lot::Mutex<Vec<bool>>,
}

impl MockSource {
    pub fn new(key_column: &'static str) -> Self {
        Self {
            key_column,
            rows: parking_lot::Mutex::new(HashMap::new()),
            should_fail: parking_lot::Mutex::new(false),
            query_log: Arc::new(parking_lot::Mutex::new(Vec::new())),
            stats_requests: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn with_rows(self, container: &str, rows: Vec<Row>) -> Self {
        self.rows.lock().insert(container.to_string(), rows);
        self
    }

    pub fn set_rows(&self, container: &str, rows: Vec<Row>) {
        self.rows.lock().insert(container.to_string(), rows);
    }

    pub fn set_failure(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    pub fn query_count(&self) -> usize {
        self.query_log.lock().len()
    }

    pub fn query_log(&self) -> Vec<(String, QueryOptions)> {
        self.query_log.lock().clone()
    }

    pub fn stats_requests(&self) -> Vec<bool> {
        self.stats_requests.lock().clone()
    }

    fn open(&self, container: String, options: &QueryOptions) -> Result<Box<dyn RowStream>> {
        self.query_log.lock().push((container.clone(), options.clone()));
        if *self.should_fail.lock() {
            return Err(CatalogError::Query("canceling statement due to statement timeout".into()));
        }
        let rows: Vec<Row> = self
            .rows
            .lock()
            .get(&container)
            .into_iter()
            .flatten()
            .filter(|row| match &options.object_name {
                Some(name) => {
                    row.get_by_name(self.key_column).and_then(Value::as_str) == Some(name.as_str())
                }
                None => true,
            })
            .cloned()
            .collect();
        Ok(MemoryRowStream::boxed(rows))
    }
}

#[async_trait]
impl<C> RowSource<C> for MockSource
where
    C: MetaContainer,
{
    async fn prepare(&self, container: &C, options: &QueryOptions) -> Result<Box<dyn RowStream>> {
        self.open(container.container_name(), options)
    }
}

#[async_trait]
impl<C> StatsRowSource<C> for MockSource
where
    C: MetaContainer,
{
    async fn prepare_statistics(
        &self,
        container: &C,
        total_size_only: bool,
    ) -> Result<Box<dyn RowStream>> {
        self.stats_requests.lock().push(total_size_only);
        self.open(container.container_name(), &QueryOptions::all())
    }
}

/// Mock provider for testing the catalog model without a database.
pub struct MockProvider {
    pub tables: Arc<MockSource>,
    pub columns: Arc<MockSource>,
    pub foreign_keys: Arc<MockSource>,
    pub statistics: Arc<MockSource>,
}

impl CatalogProvider for MockProvider {
    fn tables(&self) -> Arc<dyn RowSource<Schema>> {
        self.tables.clone()
    }

    fn columns(&self) -> Arc<dyn RowSource<Table>> {
        self.columns.clone()
    }

    fn foreign_keys(&self) -> Arc<dyn RowSource<Table>> {
        self.foreign_keys.clone()
    }

    fn table_statistics(&self) -> Arc<dyn StatsRowSource<Schema>> {
        self.statistics.clone()
    }
}

pub fn table_row(name: &str, table_type: &str) -> Row {
    Row::from_pairs([
        (fields::TABLE_NAME, Value::from(name)),
        (fields::TABLE_TYPE, Value::from(table_type)),
        (fields::TABLE_COMMENT, Value::Null),
    ])
}

pub fn column_row(name: &str, ordinal: i32, data_type: &str, nullable: &str) -> Row {
    Row::from_pairs([
        (fields::COLUMN_NAME, Value::from(name)),
        (fields::ORDINAL_POSITION, Value::Int32(ordinal)),
        (fields::DATA_TYPE, Value::from(data_type)),
        (fields::IS_NULLABLE, Value::from(nullable)),
        (fields::COLUMN_DEFAULT, Value::Null),
    ])
}

pub fn fk_row(
    constraint: &str,
    column: &str,
    referenced_table: &str,
    referenced_column: &str,
    position: i32,
) -> Row {
    Row::from_pairs([
        (fields::CONSTRAINT_NAME, Value::from(constraint)),
        (fields::COLUMN_NAME, Value::from(column)),
        (fields::REFERENCED_SCHEMA, Value::from("sales")),
        (fields::REFERENCED_TABLE, Value::from(referenced_table)),
        (fields::REFERENCED_COLUMN, Value::from(referenced_column)),
        (fields::KEY_POSITION, Value::Int32(position)),
        (fields::UPDATE_RULE, Value::from("NO ACTION")),
        (fields::DELETE_RULE, Value::from("CASCADE")),
    ])
}

pub fn stats_row(table: &str, row_count: i64, data_size: i64, index_size: i64) -> Row {
    Row::from_pairs([
        (fields::TABLE_NAME, Value::from(table)),
        (fields::ROW_COUNT, Value::Int64(row_count)),
        (fields::DATA_SIZE, Value::Int64(data_size)),
        (fields::INDEX_SIZE, Value::Int64(index_size)),
    ])
}

/// The `sales` schema: `orders` references `customers` through `fk_cust`
/// and `regions` through the two-column `fk_region`.
pub fn sales_provider() -> Arc<MockProvider> {
    let tables = MockSource::new(fields::TABLE_NAME).with_rows(
        "sales",
        vec![
            table_row("orders", "BASE TABLE"),
            table_row("customers", "BASE TABLE"),
            table_row("regions", "BASE TABLE"),
            table_row("order_totals", "VIEW"),
        ],
    );
    let columns = MockSource::new(fields::COLUMN_NAME)
        .with_rows(
            "sales.orders",
            vec![
                column_row("id", 1, "integer", "NO"),
                column_row("customer_id", 2, "integer", "NO"),
                column_row("region_id", 3, "integer", "YES"),
                column_row("country", 4, "text", "YES"),
            ],
        )
        .with_rows("sales.customers", vec![column_row("id", 1, "integer", "NO")])
        .with_rows(
            "sales.regions",
            vec![
                column_row("id", 1, "integer", "NO"),
                column_row("country", 2, "text", "NO"),
            ],
        );
    let foreign_keys = MockSource::new(fields::CONSTRAINT_NAME).with_rows(
        "sales.orders",
        vec![
            fk_row("fk_cust", "customer_id", "customers", "id", 1),
            fk_row("fk_region", "region_id", "regions", "id", 1),
            fk_row("fk_region", "country", "regions", "country", 2),
        ],
    );
    let statistics = MockSource::new(fields::TABLE_NAME).with_rows(
        "sales",
        vec![
            stats_row("orders", 1200, 65536, 16384),
            stats_row("customers", 40, 8192, 8192),
            stats_row("regions", 5, 8192, 0),
        ],
    );

    Arc::new(MockProvider {
        tables: Arc::new(tables),
        columns: Arc::new(columns),
        foreign_keys: Arc::new(foreign_keys),
        statistics: Arc::new(statistics),
    })
}
