use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::vfs::{DEFAULT_EXTENSIONS, DEFAULT_INDEX_FILES};

/// Resolution configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Source extensions probed when a specifier omits one, in priority order.
    pub extensions: Vec<String>,

    /// Index files probed when a specifier names a directory.
    pub index_files: Vec<String>,

    /// Base the import map's relative keys and values are resolved against.
    pub base_url: String,

    /// Remote resource cache settings.
    pub cache: CacheConfig,
}

/// Settings for the remote resource cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Maximum number of cached resources.
    pub max_size: usize,

    /// Time-to-live in milliseconds; entries never expire when unset.
    pub ttl_ms: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 256,
            ttl_ms: None,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            index_files: DEFAULT_INDEX_FILES.iter().map(|s| (*s).to_string()).collect(),
            base_url: "/".to_string(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Parse a config from JSON text. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Set the probed extensions.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the probed index files.
    #[must_use]
    pub fn with_index_files<I, S>(mut self, index_files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index_files = index_files.into_iter().map(Into::into).collect();
        self
    }

    /// Set the import map base.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the cache settings.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}
