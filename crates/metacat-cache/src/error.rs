use metacat_core::CatalogError;
use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that abort a cache load and reach the caller.
///
/// Failures resolving a single row never show up here; the caches log and
/// skip them.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to prepare metadata query for {container}: {source}")]
    Prepare {
        container: String,
        #[source]
        source: CatalogError,
    },

    #[error("Metadata stream for {container} failed: {source}")]
    Iteration {
        container: String,
        #[source]
        source: CatalogError,
    },

    #[error("Metadata load for {container} was cancelled")]
    Cancelled { container: String },

    #[error("Statistics collection for {container} failed: {source}")]
    Statistics {
        container: String,
        #[source]
        source: Box<CacheError>,
    },

    #[error("Invalid cache configuration: {0}")]
    Configuration(String),
}

impl CacheError {
    pub(crate) fn prepare(container: impl Into<String>, source: CatalogError) -> Self {
        match source {
            CatalogError::Cancelled => Self::Cancelled {
                container: container.into(),
            },
            source => Self::Prepare {
                container: container.into(),
                source,
            },
        }
    }

    pub(crate) fn iteration(container: impl Into<String>, source: CatalogError) -> Self {
        match source {
            CatalogError::Cancelled => Self::Cancelled {
                container: container.into(),
            },
            source => Self::Iteration {
                container: container.into(),
                source,
            },
        }
    }

    /// Whether repeating the load may succeed. Configuration errors and
    /// cancellation are not retried automatically.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Prepare { .. } | Self::Iteration { .. } => true,
            Self::Statistics { source, .. } => source.is_retryable(),
            Self::Cancelled { .. } | Self::Configuration(_) => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::Statistics { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
