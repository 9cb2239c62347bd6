use crate::Table;
use crate::fields;
use async_trait::async_trait;
use metacat_cache::EntityFactory;
use metacat_core::{CachedObject, CatalogError, LoadMonitor, Result, Row};
use serde::{Deserialize, Serialize};

/// Column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ordinal: usize,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub comment: Option<String>,
}

impl CachedObject for Column {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Decodes column rows of [`CatalogProvider::columns`](crate::CatalogProvider::columns)
pub(crate) struct ColumnFactory;

impl ColumnFactory {
    pub(crate) fn decode(row: &Row) -> Result<Column> {
        let ordinal = row.i64_field(fields::ORDINAL_POSITION)?;
        let ordinal = usize::try_from(ordinal).map_err(|_| {
            CatalogError::invalid_field(fields::ORDINAL_POSITION, format!("negative: {ordinal}"))
        })?;

        Ok(Column {
            name: row.str_field(fields::COLUMN_NAME)?.to_string(),
            ordinal,
            data_type: row.str_field(fields::DATA_TYPE)?.to_string(),
            nullable: row.bool_field(fields::IS_NULLABLE)?,
            default_value: row.opt_str_field(fields::COLUMN_DEFAULT)?.map(String::from),
            comment: row.opt_str_field(fields::COLUMN_COMMENT)?.map(String::from),
        })
    }
}

#[async_trait]
impl EntityFactory<Table, Column> for ColumnFactory {
    async fn fetch_object(
        &self,
        _monitor: &LoadMonitor,
        _table: &Table,
        row: &Row,
    ) -> Result<Option<Column>> {
        Self::decode(row).map(Some)
    }
}
