//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use metacat_cache::{
    AttachCallback, CachedObject, EntityFactory, MetaContainer, QueryOptions, RowKey, RowSource,
    RowStream, StatsApplier, StatsRowSource, SubItemFactory,
};
use metacat_core::{CatalogError, LoadMonitor, MemoryRowStream, Result, Row, Value};
use std::sync::Arc;

/// Initialize logging for tests if not already initialized
pub fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("metacat_cache=debug".parse().unwrap()),
            )
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Container standing in for a database schema
pub struct Namespace(pub String);

impl MetaContainer for Namespace {
    fn container_name(&self) -> String {
        self.0.clone()
    }
}

pub fn namespace(name: &str) -> Namespace {
    Namespace(name.to_string())
}

/// Mock row source for exercising the caches without a database.
///
/// Filtered queries keep rows whose `key_column` equals the requested name.
/// Failures can be injected at prepare time or at row N.
pub struct MockRowSource {
    pub key_column: &'static str,
    pub rows: parking_lot::Mutex<Vec<Row>>,
    pub fail_prepare: bool,
    pub fail_at_row: Option<usize>,
    pub supports_filter: bool,
    /// Options of every prepared query, for assertion in tests
    pub query_log: Arc<parking_lot::Mutex<Vec<QueryOptions>>>,
}

impl MockRowSource {
    pub fn new(key_column: &'static str) -> Self {
        Self {
            key_column,
            rows: parking_lot::Mutex::new(Vec::new()),
            fail_prepare: false,
            fail_at_row: None,
            supports_filter: true,
            query_log: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        *self.rows.lock() = rows;
        self
    }

    pub fn with_prepare_failure(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    pub fn failing_at_row(mut self, row: usize) -> Self {
        self.fail_at_row = Some(row);
        self
    }

    pub fn query_count(&self) -> usize {
        self.query_log.lock().len()
    }

    pub fn query_log(&self) -> Vec<QueryOptions> {
        self.query_log.lock().clone()
    }

    fn open(&self, options: &QueryOptions) -> Result<Box<dyn RowStream>> {
        self.query_log.lock().push(options.clone());
        if self.fail_prepare {
            return Err(CatalogError::Query("permission denied for schema".into()));
        }
        let rows: Vec<Row> = self
            .rows
            .lock()
            .iter()
            .filter(|row| match &options.object_name {
                Some(name) if self.supports_filter => {
                    row.get_by_name(self.key_column).and_then(Value::as_str) == Some(name.as_str())
                }
                _ => true,
            })
            .cloned()
            .collect();
        Ok(Box::new(FailingStream {
            inner: MemoryRowStream::new(rows),
            fail_at_row: self.fail_at_row,
            served: 0,
        }))
    }
}

#[async_trait]
impl RowSource<Namespace> for MockRowSource {
    async fn prepare(
        &self,
        _container: &Namespace,
        options: &QueryOptions,
    ) -> Result<Box<dyn RowStream>> {
        self.open(options)
    }

    fn supports_object_filter(&self) -> bool {
        self.supports_filter
    }
}

#[async_trait]
impl StatsRowSource<Namespace> for MockRowSource {
    async fn prepare_statistics(
        &self,
        _container: &Namespace,
        _total_size_only: bool,
    ) -> Result<Box<dyn RowStream>> {
        self.open(&QueryOptions::all())
    }
}

struct FailingStream {
    inner: MemoryRowStream,
    fail_at_row: Option<usize>,
    served: usize,
}

#[async_trait]
impl RowStream for FailingStream {
    async fn next(&mut self) -> Result<Option<Row>> {
        if self.fail_at_row == Some(self.served) {
            return Err(CatalogError::Query("server closed the connection".into()));
        }
        self.served += 1;
        self.inner.next().await
    }
}

// ============ Relations ============

#[derive(Debug)]
pub struct Relation {
    pub name: String,
    pub row_count: parking_lot::Mutex<Option<i64>>,
}

impl CachedObject for Relation {
    fn name(&self) -> &str {
        &self.name
    }
}

pub fn relation_row(name: &str) -> Row {
    Row::from_pairs([("relname", Value::from(name))])
}

pub fn relation_stats_row(name: &str, row_count: i64) -> Row {
    Row::from_pairs([
        ("relname", Value::from(name)),
        ("row_count", Value::from(row_count)),
    ])
}

pub struct RelationFactory;

#[async_trait]
impl EntityFactory<Namespace, Relation> for RelationFactory {
    async fn fetch_object(
        &self,
        _monitor: &LoadMonitor,
        _container: &Namespace,
        row: &Row,
    ) -> Result<Option<Relation>> {
        Ok(Some(Relation {
            name: row.str_field("relname")?.to_string(),
            row_count: parking_lot::Mutex::new(None),
        }))
    }
}

impl StatsApplier<Relation> for RelationFactory {
    fn stats_key(&self, row: &Row) -> Result<String> {
        Ok(row.str_field("relname")?.to_string())
    }

    fn apply(&self, entity: &Relation, row: &Row, _total_size_only: bool) -> Result<()> {
        *entity.row_count.lock() = Some(row.i64_field("row_count")?);
        Ok(())
    }
}

// ============ Indexes ============

#[derive(Debug)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
}

impl CachedObject for Index {
    fn name(&self) -> &str {
        &self.name
    }
}

pub fn index_row(index: &str, column: &str, seq: i64) -> Row {
    Row::from_pairs([
        ("indexname", Value::from(index)),
        ("column", Value::from(column)),
        ("seq", Value::from(seq)),
    ])
}

pub struct IndexFactory;

#[async_trait]
impl EntityFactory<Namespace, Index> for IndexFactory {
    async fn fetch_object(
        &self,
        _monitor: &LoadMonitor,
        _container: &Namespace,
        row: &Row,
    ) -> Result<Option<Index>> {
        Ok(Some(Index {
            name: row.str_field("indexname")?.to_string(),
            columns: Vec::new(),
        }))
    }
}

#[async_trait]
impl SubItemFactory<Namespace, Index, String> for IndexFactory {
    fn row_key(&self, row: &Row) -> Result<RowKey> {
        Ok(RowKey::new(
            row.str_field("indexname")?,
            row.i64_field("seq")?.to_string(),
        ))
    }

    async fn fetch_object_row(
        &self,
        _monitor: &LoadMonitor,
        _container: &Namespace,
        _entity: &Index,
        row: &Row,
    ) -> Result<Option<Vec<String>>> {
        match row.opt_str_field("column")? {
            Some(column) => Ok(Some(vec![column.to_string()])),
            None => Ok(None),
        }
    }
}

impl AttachCallback<Index, String> for IndexFactory {
    fn attach_sub_items(&self, entity: &mut Index, items: Vec<String>) {
        entity.columns = items;
    }
}
