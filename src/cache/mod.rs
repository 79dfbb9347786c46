//! Response caching.
//!
//! All backends implement [`Cache`]: `get`, `set` with an optional TTL, and
//! `clear`. Keys are content-addressed: a [`CacheKey`] is an md5 fingerprint
//! of the request kind, path and its parameters in normalized order, so two
//! requests with the same parameters supplied in a different order share an
//! entry.
//!
//! The client only writes to the cache after a successful transport
//! response. Errors and cancelled requests never produce entries.

mod file;
mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheBackend, Config};
use crate::transport::ApiRequest;

/// Content-addressed cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fingerprint a request.
    ///
    /// Kind, path and the sorted parameters are written as length-prefixed
    /// fields, so no parameter value can imitate a field boundary and the key
    /// depends only on the multiset of parameters.
    pub fn fingerprint(request: &ApiRequest) -> Self {
        let mut context = md5::Context::new();
        let mut field = |value: &str| {
            context.consume(value.len().to_string().as_bytes());
            context.consume(b":");
            context.consume(value.as_bytes());
        };

        field(request.kind().as_str());
        field(request.path());
        for (name, value) in request.normalized_params() {
            field(&name);
            field(&value);
        }

        CacheKey(format!("{:x}", context.compute()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cached response payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Response body as returned by the transport
    pub payload: Value,

    /// When the entry was stored
    pub inserted_at: DateTime<Utc>,

    /// When the entry stops being served (`None` = until cleared)
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Create an entry stored now
    pub fn new(payload: Value, ttl: Option<Duration>) -> Self {
        let inserted_at = Utc::now();
        let expires_at = ttl.and_then(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| inserted_at.checked_add_signed(ttl))
        });
        Self {
            payload,
            inserted_at,
            expires_at,
        }
    }

    /// Whether the entry has aged out
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Time left before expiry (`None` = no expiry)
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }
}

/// A key → response store shared by every operation of a client.
///
/// Implementations are internally synchronized. Lookups never mutate stored
/// data; entries only age out or get cleared.
#[async_trait]
pub trait Cache: Send + Sync + std::fmt::Debug {
    /// Which backend this is
    fn backend(&self) -> CacheBackend;

    /// Look up a live entry
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Store a payload, optionally expiring after `ttl`
    async fn set(&self, key: CacheKey, payload: Value, ttl: Option<Duration>);

    /// Drop every entry
    async fn clear(&self);
}

/// Cache backend that stores nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl Cache for NoCache {
    fn backend(&self) -> CacheBackend {
        CacheBackend::Disabled
    }

    async fn get(&self, _key: &CacheKey) -> Option<CacheEntry> {
        None
    }

    async fn set(&self, _key: CacheKey, _payload: Value, _ttl: Option<Duration>) {}

    async fn clear(&self) {}
}

/// Build the cache backend selected by the configuration
pub fn from_config(config: &Config) -> Arc<dyn Cache> {
    match config.cache_backend() {
        CacheBackend::Memory => Arc::new(MemoryCache::new(config.cache_capacity())),
        CacheBackend::File => Arc::new(FileCache::new(config.cache_dir())),
        CacheBackend::Disabled => Arc::new(NoCache),
    }
}
