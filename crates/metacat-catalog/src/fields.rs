//! Column names the catalog decoders read from provider rows.
//!
//! Providers alias their catalog queries to these names.

// Tables
pub const TABLE_NAME: &str = "table_name";
pub const TABLE_TYPE: &str = "table_type";
pub const TABLE_COMMENT: &str = "table_comment";

// Columns
pub const COLUMN_NAME: &str = "column_name";
pub const ORDINAL_POSITION: &str = "ordinal_position";
pub const DATA_TYPE: &str = "data_type";
pub const IS_NULLABLE: &str = "is_nullable";
pub const COLUMN_DEFAULT: &str = "column_default";
pub const COLUMN_COMMENT: &str = "column_comment";

// Foreign keys, one row per key column ordered by constraint then position
pub const CONSTRAINT_NAME: &str = "constraint_name";
pub const KEY_POSITION: &str = "key_position";
pub const REFERENCED_SCHEMA: &str = "referenced_schema";
pub const REFERENCED_TABLE: &str = "referenced_table";
pub const REFERENCED_COLUMN: &str = "referenced_column";
pub const UPDATE_RULE: &str = "update_rule";
pub const DELETE_RULE: &str = "delete_rule";

// Table statistics
pub const ROW_COUNT: &str = "row_count";
pub const DATA_SIZE: &str = "data_size";
pub const INDEX_SIZE: &str = "index_size";
