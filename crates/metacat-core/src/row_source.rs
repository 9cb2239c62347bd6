//! Row source contract consumed by the caches
//!
//! The remote metadata provider implements [`RowSource`] for every kind of
//! child it can list. The caches never see SQL; they only prepare a stream for
//! a container (optionally narrowed to one object) and pull rows from it.

use crate::{Result, Row};
use async_trait::async_trait;
use std::collections::VecDeque;

/// An object that owns caches of child metadata objects.
pub trait MetaContainer: Send + Sync {
    /// Name used in logs and error messages (e.g. `sales` or `sales.orders`)
    fn container_name(&self) -> String;
}

/// A materialized metadata object with a name unique within its container.
pub trait CachedObject: Send + Sync + 'static {
    fn name(&self) -> &str;
}

/// Options passed to [`RowSource::prepare`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Restrict the result to the object with this name
    pub object_name: Option<String>,
    /// Hint for the number of rows fetched per round-trip
    pub fetch_size: Option<usize>,
}

impl QueryOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn single(name: impl Into<String>) -> Self {
        Self {
            object_name: Some(name.into()),
            fetch_size: None,
        }
    }

    pub fn with_fetch_size(mut self, fetch_size: Option<usize>) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    pub fn is_single_object(&self) -> bool {
        self.object_name.is_some()
    }
}

/// A forward-only stream of metadata rows.
///
/// The stream owns its query resources; dropping it releases them.
#[async_trait]
pub trait RowStream: Send {
    /// Next row, or `None` once the result is exhausted
    async fn next(&mut self) -> Result<Option<Row>>;
}

/// Prepares metadata queries for a container.
#[async_trait]
pub trait RowSource<C: ?Sized>: Send + Sync {
    /// Start a query listing the children of `container`
    async fn prepare(&self, container: &C, options: &QueryOptions) -> Result<Box<dyn RowStream>>;

    /// Whether `prepare` honours [`QueryOptions::object_name`]
    fn supports_object_filter(&self) -> bool {
        true
    }
}

/// Row stream over rows that are already in memory
#[derive(Debug, Default)]
pub struct MemoryRowStream {
    rows: VecDeque<Row>,
}

impl MemoryRowStream {
    pub fn new(rows: impl IntoIterator<Item = Row>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
        }
    }

    pub fn boxed(rows: impl IntoIterator<Item = Row>) -> Box<dyn RowStream> {
        Box::new(Self::new(rows))
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl RowStream for MemoryRowStream {
    async fn next(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }
}
