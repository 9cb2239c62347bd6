use crate::fields;
use crate::{Column, Table};
use async_trait::async_trait;
use metacat_cache::{AttachCallback, EntityFactory, RowKey, SubItemFactory};
use metacat_core::{CachedObject, CatalogError, LoadMonitor, Result, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Foreign key action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKeyAction {
    /// Parse a referential action as catalogs report it (`NO ACTION`,
    /// `set_null`, ...). NULL means no action.
    pub fn parse(rule: Option<&str>) -> Option<Self> {
        let Some(rule) = rule else {
            return Some(Self::NoAction);
        };
        match rule.trim().replace('_', " ").to_ascii_uppercase().as_str() {
            "NO ACTION" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }

    fn from_row(row: &Row, field: &str) -> Result<Self> {
        let rule = row.opt_str_field(field)?;
        Self::parse(rule).ok_or_else(|| {
            CatalogError::invalid_field(field, format!("unknown action {}", rule.unwrap_or("")))
        })
    }
}

/// One column pair of a foreign key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyColumn {
    /// Referencing column, resolved through the owning table's column cache
    pub column: Arc<Column>,
    pub referenced_column: String,
    /// 1-based position within the key
    pub position: usize,
}

/// Foreign key of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Name of the owning table
    pub table: String,
    pub name: String,
    pub referenced_schema: Option<String>,
    pub referenced_table: String,
    pub on_update: ForeignKeyAction,
    pub on_delete: ForeignKeyAction,
    pub columns: Vec<ForeignKeyColumn>,
}

impl ForeignKey {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column.name.as_str()).collect()
    }

    pub fn referenced_column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| c.referenced_column.as_str())
            .collect()
    }

    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }
}

impl CachedObject for ForeignKey {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Assembles foreign keys from one row per key column
pub(crate) struct ForeignKeyFactory;

fn key_position(row: &Row) -> Result<usize> {
    let position = row.i64_field(fields::KEY_POSITION)?;
    usize::try_from(position)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| {
            CatalogError::invalid_field(fields::KEY_POSITION, format!("not positive: {position}"))
        })
}

#[async_trait]
impl EntityFactory<Table, ForeignKey> for ForeignKeyFactory {
    async fn fetch_object(
        &self,
        _monitor: &LoadMonitor,
        table: &Table,
        row: &Row,
    ) -> Result<Option<ForeignKey>> {
        Ok(Some(ForeignKey {
            table: table.name().to_string(),
            name: row.str_field(fields::CONSTRAINT_NAME)?.to_string(),
            referenced_schema: row.opt_str_field(fields::REFERENCED_SCHEMA)?.map(String::from),
            referenced_table: row.str_field(fields::REFERENCED_TABLE)?.to_string(),
            on_update: ForeignKeyAction::from_row(row, fields::UPDATE_RULE)?,
            on_delete: ForeignKeyAction::from_row(row, fields::DELETE_RULE)?,
            columns: Vec::new(),
        }))
    }
}

#[async_trait]
impl SubItemFactory<Table, ForeignKey, ForeignKeyColumn> for ForeignKeyFactory {
    fn row_key(&self, row: &Row) -> Result<RowKey> {
        Ok(RowKey::new(
            row.str_field(fields::CONSTRAINT_NAME)?,
            key_position(row)?.to_string(),
        ))
    }

    /// Resolves through the table's column cache only; [`Table`] loads the
    /// columns before it runs the foreign key pass.
    async fn fetch_object_row(
        &self,
        _monitor: &LoadMonitor,
        table: &Table,
        _foreign_key: &ForeignKey,
        row: &Row,
    ) -> Result<Option<Vec<ForeignKeyColumn>>> {
        let name = row.str_field(fields::COLUMN_NAME)?;
        let Some(column) = table.cached_column(name) else {
            tracing::debug!(table = %table.name(), column = %name, "foreign key column not found");
            return Ok(None);
        };

        Ok(Some(vec![ForeignKeyColumn {
            column,
            referenced_column: row.str_field(fields::REFERENCED_COLUMN)?.to_string(),
            position: key_position(row)?,
        }]))
    }
}

impl AttachCallback<ForeignKey, ForeignKeyColumn> for ForeignKeyFactory {
    fn attach_sub_items(&self, foreign_key: &mut ForeignKey, mut columns: Vec<ForeignKeyColumn>) {
        columns.sort_by_key(|c| c.position);
        foreign_key.columns = columns;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metacat_core::Value;

    #[test]
    fn test_parse_actions() {
        assert_eq!(ForeignKeyAction::parse(None), Some(ForeignKeyAction::NoAction));
        assert_eq!(
            ForeignKeyAction::parse(Some("NO ACTION")),
            Some(ForeignKeyAction::NoAction)
        );
        assert_eq!(
            ForeignKeyAction::parse(Some("set_null")),
            Some(ForeignKeyAction::SetNull)
        );
        assert_eq!(
            ForeignKeyAction::parse(Some("Cascade")),
            Some(ForeignKeyAction::Cascade)
        );
        assert_eq!(ForeignKeyAction::parse(Some("explode")), None);
    }

    #[test]
    fn test_unknown_action_is_invalid_field() {
        let row = Row::from_pairs([(fields::DELETE_RULE, Value::from("explode"))]);
        let err = ForeignKeyAction::from_row(&row, fields::DELETE_RULE).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidField { field, .. } if field == fields::DELETE_RULE));
    }

    #[test]
    fn test_row_key_uses_constraint_and_position() {
        let row = Row::from_pairs([
            (fields::CONSTRAINT_NAME, Value::from("fk_region")),
            (fields::KEY_POSITION, Value::Int32(2)),
        ]);
        let key = ForeignKeyFactory.row_key(&row).unwrap();
        assert_eq!(key, RowKey::new("fk_region", "2"));
    }

    #[test]
    fn test_zero_position_is_rejected() {
        let row = Row::from_pairs([
            (fields::CONSTRAINT_NAME, Value::from("fk_region")),
            (fields::KEY_POSITION, Value::Int32(0)),
        ]);
        assert!(ForeignKeyFactory.row_key(&row).is_err());
    }
}
