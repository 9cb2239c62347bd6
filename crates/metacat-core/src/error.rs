//! Error types for metadata row sources and decoders

use thiserror::Error;

/// Core error type raised by row sources, row streams and row decoders.
///
/// The cache layer classifies these by where they surfaced (prepare or
/// iteration); a `CatalogError` returned from an entity or sub-item factory is
/// a row resolution failure and is absorbed by the cache.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Query error: {0}")]
    Query(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid value for field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl CatalogError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for row source operations
pub type Result<T> = std::result::Result<T, CatalogError>;
