//! Cache configuration

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// How object names are compared in the name index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCase {
    /// Names match byte for byte
    #[default]
    Sensitive,
    /// Names are folded to lowercase for lookups; entities keep their
    /// display name
    Insensitive,
}

impl NameCase {
    /// Index key for `name`
    pub fn normalize<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self {
            NameCase::Sensitive => Cow::Borrowed(name),
            NameCase::Insensitive if name.chars().any(char::is_uppercase) => {
                Cow::Owned(name.to_lowercase())
            }
            NameCase::Insensitive => Cow::Borrowed(name),
        }
    }
}

/// What a failed statistics query does to the "collected" flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsFailurePolicy {
    /// Go back to not-collected so the next call queries again
    #[default]
    Retry,
    /// Keep the flag set; partial statistics stay until a forced refresh
    MarkCollected,
}

/// Configuration shared by the caches of one metadata provider
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name comparison for the object index
    pub name_case: NameCase,
    /// Rows per round-trip hint forwarded to the row source
    pub fetch_size: Option<usize>,
    /// Flag handling when a statistics query fails
    pub statistics_failure: StatsFailurePolicy,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `[cache]`-less TOML document, e.g.
    ///
    /// ```toml
    /// name_case = "insensitive"
    /// fetch_size = 500
    /// statistics_failure = "mark_collected"
    /// ```
    pub fn from_toml_str(source: &str) -> CacheResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| CacheError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.fetch_size == Some(0) {
            return Err(CacheError::Configuration(
                "fetch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_name_case(mut self, name_case: NameCase) -> Self {
        self.name_case = name_case;
        self
    }

    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = Some(fetch_size);
        self
    }

    pub fn with_statistics_failure(mut self, policy: StatsFailurePolicy) -> Self {
        self.statistics_failure = policy;
        self
    }
}
