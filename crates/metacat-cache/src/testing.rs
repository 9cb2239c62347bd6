//! Scripted row sources and small entity types for unit tests

use crate::factory::{AttachCallback, EntityFactory, RowKey, SubItemFactory};
use crate::statistics::{StatsApplier, StatsRowSource};
use async_trait::async_trait;
use metacat_core::{
    CachedObject, CatalogError, LoadMonitor, MetaContainer, QueryOptions, Result, Row, RowSource,
    RowStream, Value,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub(crate) struct TestContainer(pub &'static str);

impl MetaContainer for TestContainer {
    fn container_name(&self) -> String {
        self.0.to_string()
    }
}

/// Row source replaying a fixed row list.
///
/// Filtered queries keep only rows whose `filter_column` equals the requested
/// name. Failures can be injected at prepare time or after `n` rows.
pub(crate) struct ScriptedSource {
    rows: Mutex<Vec<Row>>,
    filter_column: &'static str,
    supports_filter: bool,
    fail_prepare: Mutex<bool>,
    fail_after: Mutex<Option<usize>>,
    prepared: Mutex<Vec<QueryOptions>>,
    stats_requests: Mutex<Vec<bool>>,
}

impl ScriptedSource {
    pub(crate) fn new(filter_column: &'static str, rows: Vec<Row>) -> Self {
        Self {
            rows: Mutex::new(rows),
            filter_column,
            supports_filter: true,
            fail_prepare: Mutex::new(false),
            fail_after: Mutex::new(None),
            prepared: Mutex::new(Vec::new()),
            stats_requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn without_filter(mut self) -> Self {
        self.supports_filter = false;
        self
    }

    pub(crate) fn set_rows(&self, rows: Vec<Row>) {
        *self.rows.lock() = rows;
    }

    pub(crate) fn fail_prepare(&self, fail: bool) {
        *self.fail_prepare.lock() = fail;
    }

    pub(crate) fn fail_after(&self, rows: Option<usize>) {
        *self.fail_after.lock() = rows;
    }

    pub(crate) fn prepare_count(&self) -> usize {
        self.prepared.lock().len()
    }

    pub(crate) fn prepared(&self) -> Vec<QueryOptions> {
        self.prepared.lock().clone()
    }

    /// `total_size_only` flag of every statistics query, in order
    pub(crate) fn stats_requests(&self) -> Vec<bool> {
        self.stats_requests.lock().clone()
    }

    fn stream(&self, options: &QueryOptions) -> Result<Box<dyn RowStream>> {
        if *self.fail_prepare.lock() {
            return Err(CatalogError::Query("relation does not exist".into()));
        }
        let rows: VecDeque<Row> = self
            .rows
            .lock()
            .iter()
            .filter(|row| match &options.object_name {
                Some(name) if self.supports_filter => row
                    .get_by_name(self.filter_column)
                    .and_then(Value::as_str)
                    .is_some_and(|v| v == name.as_str()),
                _ => true,
            })
            .cloned()
            .collect();
        Ok(Box::new(ScriptedStream {
            rows,
            fail_after: *self.fail_after.lock(),
            served: 0,
        }))
    }
}

#[async_trait]
impl RowSource<TestContainer> for ScriptedSource {
    async fn prepare(
        &self,
        _container: &TestContainer,
        options: &QueryOptions,
    ) -> Result<Box<dyn RowStream>> {
        self.prepared.lock().push(options.clone());
        self.stream(options)
    }

    fn supports_object_filter(&self) -> bool {
        self.supports_filter
    }
}

#[async_trait]
impl StatsRowSource<TestContainer> for ScriptedSource {
    async fn prepare_statistics(
        &self,
        _container: &TestContainer,
        total_size_only: bool,
    ) -> Result<Box<dyn RowStream>> {
        self.stats_requests.lock().push(total_size_only);
        self.stream(&QueryOptions::all())
    }
}

struct ScriptedStream {
    rows: VecDeque<Row>,
    fail_after: Option<usize>,
    served: usize,
}

#[async_trait]
impl RowStream for ScriptedStream {
    async fn next(&mut self) -> Result<Option<Row>> {
        if self.fail_after == Some(self.served) {
            return Err(CatalogError::Query("connection reset by peer".into()));
        }
        self.served += 1;
        Ok(self.rows.pop_front())
    }
}

// ============ Lookup entities ============

#[derive(Debug)]
pub(crate) struct Item {
    pub name: String,
    pub value: i64,
    pub size: Mutex<Option<i64>>,
}

impl CachedObject for Item {
    fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) fn item_row(name: &str, value: i64) -> Row {
    Row::from_pairs([("name", Value::from(name)), ("value", Value::from(value))])
}

/// Builds [`Item`]s. A row named `stop` cancels the monitor, a row without a
/// numeric value fails to resolve, a row named `skip*` is skipped.
#[derive(Default)]
pub(crate) struct ItemFactory;

#[async_trait]
impl EntityFactory<TestContainer, Item> for ItemFactory {
    async fn fetch_object(
        &self,
        monitor: &LoadMonitor,
        _container: &TestContainer,
        row: &Row,
    ) -> Result<Option<Item>> {
        let name = row.str_field("name")?;
        if name == "stop" {
            monitor.cancel();
        }
        if name.starts_with("skip") {
            return Ok(None);
        }
        Ok(Some(Item {
            name: name.to_string(),
            value: row.i64_field("value")?,
            size: Mutex::new(None),
        }))
    }
}

impl StatsApplier<Item> for ItemFactory {
    fn stats_key(&self, row: &Row) -> Result<String> {
        Ok(row.str_field("name")?.to_string())
    }

    fn apply(&self, entity: &Item, row: &Row, _total_size_only: bool) -> Result<()> {
        *entity.size.lock() = Some(row.i64_field("value")?);
        Ok(())
    }
}

// ============ Composite entities ============

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyColumn {
    pub column: String,
    pub position: i64,
}

#[derive(Debug)]
pub(crate) struct Constraint {
    pub name: String,
    pub columns: Vec<KeyColumn>,
    pub attached: usize,
}

impl CachedObject for Constraint {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Constraint {
    pub(crate) fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column.as_str()).collect()
    }
}

pub(crate) fn key_row(constraint: &str, column: &str, position: i64) -> Row {
    Row::from_pairs([
        ("constraint", Value::from(constraint)),
        ("column", Value::from(column)),
        ("position", Value::from(position)),
    ])
}

/// Builds [`Constraint`]s from `(constraint, column, position)` rows.
///
/// Column `missing` does not resolve (`None`), column `broken` fails with an
/// error, constraint `bad*` cannot be built.
#[derive(Default)]
pub(crate) struct ConstraintFactory {
    pub fetch_calls: Mutex<Vec<String>>,
}

impl ConstraintFactory {
    pub(crate) fn fetched(&self) -> Vec<String> {
        self.fetch_calls.lock().clone()
    }
}

#[async_trait]
impl EntityFactory<TestContainer, Constraint> for ConstraintFactory {
    async fn fetch_object(
        &self,
        _monitor: &LoadMonitor,
        _container: &TestContainer,
        row: &Row,
    ) -> Result<Option<Constraint>> {
        let name = row.str_field("constraint")?;
        self.fetch_calls.lock().push(name.to_string());
        if name.starts_with("bad") {
            return Err(CatalogError::NotFound(format!("owner of {name}")));
        }
        Ok(Some(Constraint {
            name: name.to_string(),
            columns: Vec::new(),
            attached: 0,
        }))
    }
}

#[async_trait]
impl SubItemFactory<TestContainer, Constraint, KeyColumn> for ConstraintFactory {
    fn row_key(&self, row: &Row) -> Result<RowKey> {
        Ok(RowKey::new(
            row.str_field("constraint")?,
            row.i64_field("position")?.to_string(),
        ))
    }

    async fn fetch_object_row(
        &self,
        monitor: &LoadMonitor,
        _container: &TestContainer,
        _entity: &Constraint,
        row: &Row,
    ) -> Result<Option<Vec<KeyColumn>>> {
        let column = row.str_field("column")?;
        match column {
            "missing" => Ok(None),
            "broken" => Err(CatalogError::NotFound(format!("column {column}"))),
            "stop" => {
                monitor.cancel();
                Ok(Some(Vec::new()))
            }
            _ => Ok(Some(vec![KeyColumn {
                column: column.to_string(),
                position: row.i64_field("position")?,
            }])),
        }
    }
}

impl AttachCallback<Constraint, KeyColumn> for ConstraintFactory {
    fn attach_sub_items(&self, entity: &mut Constraint, items: Vec<KeyColumn>) {
        entity.columns = items;
        entity.attached += 1;
    }
}

pub(crate) fn container() -> TestContainer {
    TestContainer("sales")
}

pub(crate) fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
