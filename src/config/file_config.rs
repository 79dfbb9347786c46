//! Configuration file support for trove-master.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! key = "your-trove-api-key"
//! base_url = "https://api.trove.nla.gov.au/v3"
//!
//! [limits]
//! rate_limit = 2.0
//! burst_limit = 5
//! max_concurrency = 4
//!
//! [cache]
//! backend = "memory"          # memory | file | none
//! directory = "~/.cache/trove-master"
//! search_ttl_seconds = 1800
//! record_ttl_seconds = 3600
//! max_entries = 10000
//!
//! [http]
//! timeout_seconds = 30
//! connect_timeout_seconds = 10
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 500
//! max_delay_ms = 30000
//! ```
//!
//! A TTL of `0` disables expiry for that entry class.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{
    apply_env_overrides, default_burst_limit, default_cache_capacity, default_max_concurrency,
    default_rate_limit, default_record_ttl, default_search_ttl, CacheBackend, Config, API_KEY_ENV,
    DEFAULT_BASE_URL,
};
use crate::error::{ArchiveError, Result};
use crate::utils::RetryConfig;

/// Configuration file structure
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub api: ApiSection,

    #[serde(default)]
    pub limits: LimitsSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub http: HttpSection,

    #[serde(default)]
    pub retry: RetrySection,
}

/// API credentials and endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    /// Falls back to `TROVE_API_KEY` when absent
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            key: None,
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Throughput limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSection {
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,

    #[serde(default = "default_burst_limit")]
    pub burst_limit: u32,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            rate_limit: default_rate_limit(),
            burst_limit: default_burst_limit(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default)]
    pub backend: CacheBackend,

    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_search_ttl")]
    pub search_ttl_seconds: u64,

    #[serde(default = "default_record_ttl")]
    pub record_ttl_seconds: u64,

    #[serde(default = "default_cache_capacity")]
    pub max_entries: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            directory: None,
            search_ttl_seconds: default_search_ttl(),
            record_ttl_seconds: default_record_ttl(),
            max_entries: default_cache_capacity(),
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            user_agent: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// Transport retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn ttl(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds))
}

impl ConfigFile {
    /// Load configuration from a TOML file (no environment layering)
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }

    /// Convert into a validated [`Config`].
    ///
    /// A missing `api.key` is looked up under `TROVE_API_KEY` through `lookup`,
    /// and `TROVE_MASTER_*` variables found through it override file values.
    pub fn into_config<F>(self, lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = self
            .api
            .key
            .or_else(|| lookup(API_KEY_ENV))
            .ok_or_else(|| {
                ArchiveError::Configuration(format!(
                    "no api key in config file and {} is not set",
                    API_KEY_ENV
                ))
            })?;

        let retry = RetryConfig::default()
            .max_attempts(self.retry.max_attempts)
            .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms));

        let mut builder = Config::builder(api_key)
            .base_url(self.api.base_url)
            .rate_limit(self.limits.rate_limit)
            .burst_limit(self.limits.burst_limit)
            .max_concurrency(self.limits.max_concurrency)
            .cache_backend(self.cache.backend)
            .cache_capacity(self.cache.max_entries)
            .search_ttl(ttl(self.cache.search_ttl_seconds))
            .record_ttl(ttl(self.cache.record_ttl_seconds))
            .request_timeout(Duration::from_secs(self.http.timeout_seconds))
            .connect_timeout(Duration::from_secs(self.http.connect_timeout_seconds))
            .retry(retry);

        if let Some(dir) = self.cache.directory {
            builder = builder.cache_dir(dir);
        }
        if let Some(agent) = self.http.user_agent {
            builder = builder.user_agent(agent);
        }

        apply_env_overrides(builder, &lookup)?.build()
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
