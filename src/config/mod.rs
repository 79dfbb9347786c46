//! Configuration management.
//!
//! A [`Config`] is validated once, at construction, and is immutable
//! afterwards. It can be built explicitly through [`ConfigBuilder`], read
//! from the environment with [`Config::from_env`], or loaded from a TOML file
//! with [`load_config`].
//!
//! Both environment and file loading honour the same flat overrides, which
//! win over file values:
//!
//! | Variable | Setting |
//! |---|---|
//! | `TROVE_API_KEY` | credential (a key in the file takes precedence) |
//! | `TROVE_MASTER_RATE_LIMIT` | requests per second |
//! | `TROVE_MASTER_BURST_LIMIT` | token bucket size |
//! | `TROVE_MASTER_MAX_CONCURRENCY` | requests in flight |
//! | `TROVE_MASTER_CACHE_BACKEND` | `memory`, `file` or `none` |
//! | `TROVE_MASTER_BASE_URL` | API root |

mod file_config;

pub use file_config::{
    ApiSection, CacheSection, ConfigFile, ConfigFileError, HttpSection, LimitsSection,
    RetrySection,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ArchiveError, Result};
use crate::utils::RetryConfig;

/// Environment variable holding the API credential
pub const API_KEY_ENV: &str = "TROVE_API_KEY";

/// Prefix for all other environment overrides
pub const ENV_PREFIX: &str = "TROVE_MASTER";

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.trove.nla.gov.au/v3";

/// Which cache implementation the client uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process cache with per-entry expiry
    #[default]
    Memory,
    /// JSON files under a cache directory
    File,
    /// Caching disabled
    #[serde(rename = "none")]
    Disabled,
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackend::Memory => "memory",
            CacheBackend::File => "file",
            CacheBackend::Disabled => "none",
        }
    }
}

impl FromStr for CacheBackend {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "in_memory" => Ok(CacheBackend::Memory),
            "file" | "disk" => Ok(CacheBackend::File),
            "none" | "off" | "disabled" => Ok(CacheBackend::Disabled),
            other => Err(ArchiveError::Configuration(format!(
                "unknown cache backend '{}' (expected memory, file or none)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated client configuration
#[derive(Clone)]
pub struct Config {
    api_key: String,
    base_url: String,
    rate_limit: f64,
    burst_limit: u32,
    max_concurrency: usize,
    cache_backend: CacheBackend,
    cache_dir: Option<PathBuf>,
    cache_capacity: u64,
    search_ttl: Option<Duration>,
    record_ttl: Option<Duration>,
    request_timeout: Duration,
    connect_timeout: Duration,
    user_agent: String,
    retry: RetryConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .field("burst_limit", &self.burst_limit)
            .field("max_concurrency", &self.max_concurrency)
            .field("cache_backend", &self.cache_backend)
            .field("cache_dir", &self.cache_dir)
            .field("search_ttl", &self.search_ttl)
            .field("record_ttl", &self.record_ttl)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Start building a configuration for the given credential
    pub fn builder(api_key: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(api_key)
    }

    /// Configuration with default limits for the given credential
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// Read configuration from the process environment.
    ///
    /// The credential comes from `TROVE_API_KEY`; its absence is an error.
    /// `TROVE_MASTER_RATE_LIMIT`, `TROVE_MASTER_BURST_LIMIT`,
    /// `TROVE_MASTER_MAX_CONCURRENCY`, `TROVE_MASTER_CACHE_BACKEND` and
    /// `TROVE_MASTER_BASE_URL` override the defaults when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] but with an injectable variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_ENV).ok_or_else(|| {
            ArchiveError::Configuration(format!("environment variable {} is not set", API_KEY_ENV))
        })?;

        apply_env_overrides(Config::builder(api_key), &lookup)?.build()
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sustained requests per second
    pub fn rate_limit(&self) -> f64 {
        self.rate_limit
    }

    /// Token bucket capacity
    pub fn burst_limit(&self) -> u32 {
        self.burst_limit
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn cache_backend(&self) -> CacheBackend {
        self.cache_backend
    }

    /// Directory for the file cache backend (platform cache dir if unset)
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    pub fn cache_capacity(&self) -> u64 {
        self.cache_capacity
    }

    /// Lifetime of cached search pages (`None` = until cleared)
    pub fn search_ttl(&self) -> Option<Duration> {
        self.search_ttl
    }

    /// Lifetime of cached records and full text (`None` = until cleared)
    pub fn record_ttl(&self) -> Option<Duration> {
        self.record_ttl
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn retry(&self) -> RetryConfig {
        self.retry
    }
}

/// Apply `TROVE_MASTER_*` overrides on top of `builder`
pub(crate) fn apply_env_overrides<F>(mut builder: ConfigBuilder, lookup: &F) -> Result<ConfigBuilder>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(rate) = parse_var::<f64, _>(lookup, "RATE_LIMIT")? {
        builder = builder.rate_limit(rate);
    }
    if let Some(burst) = parse_var::<u32, _>(lookup, "BURST_LIMIT")? {
        builder = builder.burst_limit(burst);
    }
    if let Some(max) = parse_var::<usize, _>(lookup, "MAX_CONCURRENCY")? {
        builder = builder.max_concurrency(max);
    }
    if let Some(backend) = lookup(&format!("{}_CACHE_BACKEND", ENV_PREFIX)) {
        builder = builder.cache_backend(backend.parse()?);
    }
    if let Some(url) = lookup(&format!("{}_BASE_URL", ENV_PREFIX)) {
        builder = builder.base_url(url);
    }
    Ok(builder)
}

fn parse_var<T, F>(lookup: &F, suffix: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let name = format!("{}_{}", ENV_PREFIX, suffix);
    match lookup(&name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            ArchiveError::Configuration(format!("{} has an invalid value '{}': {}", name, raw, e))
        }),
    }
}

/// Builder for [`Config`]; validation happens in [`ConfigBuilder::build`]
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    api_key: String,
    base_url: String,
    rate_limit: f64,
    burst_limit: u32,
    max_concurrency: usize,
    cache_backend: CacheBackend,
    cache_dir: Option<PathBuf>,
    cache_capacity: u64,
    search_ttl: Option<Duration>,
    record_ttl: Option<Duration>,
    request_timeout: Duration,
    connect_timeout: Duration,
    user_agent: String,
    retry: RetryConfig,
}

impl ConfigBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit: default_rate_limit(),
            burst_limit: default_burst_limit(),
            max_concurrency: default_max_concurrency(),
            cache_backend: CacheBackend::default(),
            cache_dir: None,
            cache_capacity: default_cache_capacity(),
            search_ttl: Some(Duration::from_secs(default_search_ttl())),
            record_ttl: Some(Duration::from_secs(default_record_ttl())),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryConfig::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn rate_limit(mut self, requests_per_second: f64) -> Self {
        self.rate_limit = requests_per_second;
        self
    }

    pub fn burst_limit(mut self, burst: u32) -> Self {
        self.burst_limit = burst;
        self
    }

    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn cache_backend(mut self, backend: CacheBackend) -> Self {
        self.cache_backend = backend;
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn cache_capacity(mut self, entries: u64) -> Self {
        self.cache_capacity = entries;
        self
    }

    pub fn search_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.search_ttl = ttl;
        self
    }

    pub fn record_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.record_ttl = ttl;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<Config> {
        let api_key = self.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(ArchiveError::Configuration(
                "api_key must not be empty".to_string(),
            ));
        }
        if !self.rate_limit.is_finite() || self.rate_limit <= 0.0 {
            return Err(ArchiveError::Configuration(format!(
                "rate_limit must be a positive number, got {}",
                self.rate_limit
            )));
        }
        // one token per refill period; the period must fit in a Duration
        if Duration::try_from_secs_f64(1.0 / self.rate_limit).is_err() {
            return Err(ArchiveError::Configuration(format!(
                "rate_limit {} is too small",
                self.rate_limit
            )));
        }
        if self.burst_limit == 0 {
            return Err(ArchiveError::Configuration(
                "burst_limit must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ArchiveError::Configuration(
                "max_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ArchiveError::Configuration(
                "cache_capacity must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ArchiveError::Configuration(
                "timeouts must be greater than zero".to_string(),
            ));
        }

        let parsed = url::Url::parse(&self.base_url).map_err(|e| {
            ArchiveError::Configuration(format!("invalid base_url '{}': {}", self.base_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ArchiveError::Configuration(format!(
                "base_url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        Ok(Config {
            api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            rate_limit: self.rate_limit,
            burst_limit: self.burst_limit,
            max_concurrency: self.max_concurrency,
            cache_backend: self.cache_backend,
            cache_dir: self.cache_dir,
            cache_capacity: self.cache_capacity,
            search_ttl: self.search_ttl,
            record_ttl: self.record_ttl,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            user_agent: self.user_agent,
            retry: self.retry,
        })
    }
}

pub(crate) fn default_rate_limit() -> f64 {
    2.0
}

pub(crate) fn default_burst_limit() -> u32 {
    5
}

pub(crate) fn default_max_concurrency() -> usize {
    4
}

pub(crate) fn default_cache_capacity() -> u64 {
    10_000
}

pub(crate) fn default_search_ttl() -> u64 {
    1800 // 30 minutes
}

pub(crate) fn default_record_ttl() -> u64 {
    3600
}

/// Default directory for the file cache backend
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("trove-master")
}

/// Load configuration from a TOML file, with the same `TROVE_MASTER_*`
/// environment overrides as [`Config::from_env`] layered on top.
pub fn load_config(path: &Path) -> Result<Config> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .map_err(|e| ArchiveError::Configuration(e.to_string()))?;

    let file: ConfigFile = settings
        .try_deserialize()
        .map_err(|e| ArchiveError::Configuration(e.to_string()))?;

    file.into_config(|name| std::env::var(name).ok())
}

/// Find a config file in the working directory or the platform config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("trove-master.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("trove-master").join("config.toml"))
        .filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::new("key").unwrap();
        assert_eq!(config.api_key(), "key");
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.cache_backend(), CacheBackend::Memory);
        assert!(config.rate_limit() > 0.0);
        assert!(config.burst_limit() > 0);
        assert!(config.max_concurrency() > 0);
    }

    #[test]
    fn test_rejects_missing_credential() {
        let err = Config::new("   ").unwrap_err();
        assert!(matches!(err, ArchiveError::Configuration(_)));
    }

    #[test]
    fn test_rejects_non_positive_limits() {
        for builder in [
            Config::builder("k").rate_limit(0.0),
            Config::builder("k").rate_limit(-1.0),
            Config::builder("k").rate_limit(f64::NAN),
            Config::builder("k").rate_limit(1e-30),
            Config::builder("k").burst_limit(0),
            Config::builder("k").max_concurrency(0),
        ] {
            assert!(matches!(
                builder.build(),
                Err(ArchiveError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_tiny_rate_is_a_configuration_error() {
        let err = Config::builder("k").rate_limit(1e-30).build().unwrap_err();
        assert!(err.to_string().contains("too small"), "{}", err);

        // the smallest rates that do build still yield a working client
        let config = Config::builder("k").rate_limit(1e-6).build().unwrap();
        assert!(crate::Client::new(config).is_ok());
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let err = Config::builder("k").base_url("ftp://example.com").build();
        assert!(matches!(err, Err(ArchiveError::Configuration(_))));

        let config = Config::builder("k")
            .base_url("http://localhost:1234/v3/")
            .build()
            .unwrap();
        assert_eq!(config.base_url(), "http://localhost:1234/v3");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config::new("super-secret").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(lookup_from(&[
            ("TROVE_API_KEY", "env-key"),
            ("TROVE_MASTER_RATE_LIMIT", "10"),
            ("TROVE_MASTER_BURST_LIMIT", "2"),
            ("TROVE_MASTER_CACHE_BACKEND", "none"),
        ]))
        .unwrap();

        assert_eq!(config.api_key(), "env-key");
        assert_eq!(config.rate_limit(), 10.0);
        assert_eq!(config.burst_limit(), 2);
        assert_eq!(config.cache_backend(), CacheBackend::Disabled);
    }

    #[test]
    fn test_from_lookup_missing_key() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ArchiveError::Configuration(msg) if msg.contains(API_KEY_ENV)));
    }

    #[test]
    fn test_from_lookup_unparsable_value() {
        let err = Config::from_lookup(lookup_from(&[
            ("TROVE_API_KEY", "k"),
            ("TROVE_MASTER_MAX_CONCURRENCY", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ArchiveError::Configuration(_)));
    }

    #[test]
    fn test_cache_backend_parse() {
        assert_eq!("memory".parse::<CacheBackend>().unwrap(), CacheBackend::Memory);
        assert_eq!("FILE".parse::<CacheBackend>().unwrap(), CacheBackend::File);
        assert_eq!("none".parse::<CacheBackend>().unwrap(), CacheBackend::Disabled);
        assert!("redis".parse::<CacheBackend>().is_err());
    }
}
