//! Table statistics applied by the schema's statistics collector

use crate::Table;
use crate::fields;
use chrono::{DateTime, Utc};
use metacat_cache::StatsApplier;
use metacat_core::{CatalogError, Result, Row};
use serde::{Deserialize, Serialize};

/// Statistics for a single table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableStatistics {
    /// Estimated row count. Not reported by size-only collection.
    pub row_count: Option<u64>,
    /// Table data size in bytes.
    pub data_size_bytes: u64,
    /// Total index size in bytes.
    pub index_size_bytes: u64,
    /// When statistics were last applied.
    pub last_updated: DateTime<Utc>,
}

impl TableStatistics {
    pub fn new(data_size_bytes: u64, index_size_bytes: u64) -> Self {
        Self {
            row_count: None,
            data_size_bytes,
            index_size_bytes,
            last_updated: Utc::now(),
        }
    }

    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    /// Data plus index size
    pub fn total_size(&self) -> u64 {
        self.data_size_bytes + self.index_size_bytes
    }
}

fn non_negative(row: &Row, field: &str) -> Result<Option<u64>> {
    row.opt_i64_field(field)?
        .map(|value| {
            u64::try_from(value)
                .map_err(|_| CatalogError::invalid_field(field, format!("negative: {value}")))
        })
        .transpose()
}

/// Applies rows of [`CatalogProvider::table_statistics`](crate::CatalogProvider::table_statistics)
pub(crate) struct TableStatisticsApplier;

impl StatsApplier<Table> for TableStatisticsApplier {
    fn stats_key(&self, row: &Row) -> Result<String> {
        Ok(row.str_field(fields::TABLE_NAME)?.to_string())
    }

    fn apply(&self, table: &Table, row: &Row, total_size_only: bool) -> Result<()> {
        let data_size = non_negative(row, fields::DATA_SIZE)?.unwrap_or(0);
        let index_size = non_negative(row, fields::INDEX_SIZE)?.unwrap_or(0);
        let mut stats = TableStatistics::new(data_size, index_size);

        if total_size_only {
            // Keep the row count of an earlier full collection
            stats.row_count = table.statistics().and_then(|previous| previous.row_count);
        } else {
            stats.row_count = non_negative(row, fields::ROW_COUNT)?;
        }
        table.set_statistics(stats);
        Ok(())
    }
}
