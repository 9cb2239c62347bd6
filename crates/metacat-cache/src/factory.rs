//! Capability traits a metadata provider implements per cache instance

use async_trait::async_trait;
use metacat_core::{LoadMonitor, Result, Row};

/// Builds an entity from a result row.
///
/// `Ok(None)` skips the row quietly; `Err` is a row resolution failure that the
/// cache logs and skips.
#[async_trait]
pub trait EntityFactory<C, E>: Send + Sync {
    async fn fetch_object(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        row: &Row,
    ) -> Result<Option<E>>;
}

/// Composite key of one row of a grouped result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    /// Name of the entity the row belongs to; rows arrive ordered by it
    pub entity_key: String,
    /// Identity of the row within its entity group, if the source has one
    pub sub_key: Option<String>,
}

impl RowKey {
    pub fn new(entity_key: impl Into<String>, sub_key: impl Into<String>) -> Self {
        Self {
            entity_key: entity_key.into(),
            sub_key: Some(sub_key.into()),
        }
    }

    pub fn entity(entity_key: impl Into<String>) -> Self {
        Self {
            entity_key: entity_key.into(),
            sub_key: None,
        }
    }
}

/// Turns rows of a grouped result into sub-items of their entity.
#[async_trait]
pub trait SubItemFactory<C, E, S>: Send + Sync {
    /// Extract the grouping key. `entity_key` must equal the name of the
    /// entity `fetch_object` builds from the same row.
    fn row_key(&self, row: &Row) -> Result<RowKey>;

    /// Sub-items contributed by `row`. `Ok(None)` and `Err` both mean the row
    /// could not be resolved; the cache logs it and drops the contribution.
    async fn fetch_object_row(
        &self,
        monitor: &LoadMonitor,
        container: &C,
        entity: &E,
        row: &Row,
    ) -> Result<Option<Vec<S>>>;
}

/// Makes the accumulated sub-items visible on their entity. Called once per
/// entity per pass, before the entity is published.
pub trait AttachCallback<E, S>: Send + Sync {
    fn attach_sub_items(&self, entity: &mut E, items: Vec<S>);
}

/// Everything a [`CompositeCache`](crate::CompositeCache) needs from its provider
pub trait CompositeFactory<C, E, S>:
    EntityFactory<C, E> + SubItemFactory<C, E, S> + AttachCallback<E, S>
{
}

impl<C, E, S, T> CompositeFactory<C, E, S> for T where
    T: EntityFactory<C, E> + SubItemFactory<C, E, S> + AttachCallback<E, S>
{
}
