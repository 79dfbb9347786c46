//! The archive client.
//!
//! A [`Client`] owns its configuration, rate limiter, concurrency gate, cache
//! and connector. Clones share all of them. Network access is only possible
//! inside a scope opened with [`Client::open`] or [`Client::scoped`]; the
//! scope owns the connection pool and releases it when it ends.
//!
//! Every request follows the same path:
//!
//! 1. cache lookup (hits return immediately and consume no token)
//! 2. claim on the request's cache key, so identical concurrent requests
//!    wait for the first one and then read its cached response
//! 3. concurrency gate slot
//! 4. rate limiter token, then the transport call; a transient failure is
//!    retried with backoff and every attempt takes a fresh token
//! 5. cache write, only after a successful response
//!
//! Each wait is raced against the client's cancellation token.
//!
//! ```rust,no_run
//! use trove_master::{Client, Config};
//! use trove_master::models::{Category, SearchQuery};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(Config::from_env()?)?;
//! let total = client
//!     .scoped(|client| async move {
//!         SearchQuery::new()
//!             .text("Dunbar wreck")
//!             .category(Category::Newspaper)
//!             .count(&client)
//!             .await
//!     })
//!     .await?;
//! println!("{} articles", total);
//! # Ok(())
//! # }
//! ```

mod in_flight;
mod pages;
mod resources;

pub use pages::Pages;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use self::in_flight::InFlight;
use crate::cache::{self, Cache, CacheKey};
use crate::config::{CacheBackend, Config};
use crate::error::{ArchiveError, Result};
use crate::transport::{ApiRequest, Connector, HttpConnector, RequestKind, Transport};
use crate::utils::{with_retry, ConcurrencyGate, RateLimiter};

/// Usage counters for a client and all its clones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStats {
    /// Attempts handed to the transport, successful or not (retries included)
    pub transport_calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[derive(Debug, Default)]
struct Counters {
    transport_calls: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

struct ClientInner {
    config: Config,
    limiter: RateLimiter,
    gate: ConcurrencyGate,
    cache: Arc<dyn Cache>,
    in_flight: InFlight,
    connector: Arc<dyn Connector>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    counters: Counters,
}

/// Rate-limited, cached client for the archive API
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("cache", &self.inner.cache.backend())
            .field("in_flight_keys", &self.inner.in_flight.len())
            .field("open", &self.is_open())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Builder for a [`Client`] with a custom connector or cache
pub struct ClientBuilder {
    config: Config,
    connector: Option<Arc<dyn Connector>>,
    cache: Option<Arc<dyn Cache>>,
}

impl ClientBuilder {
    /// Use `connector` instead of the HTTP connector
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Use `cache` instead of the backend named in the configuration
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<Client> {
        let limiter = RateLimiter::new(self.config.rate_limit(), self.config.burst_limit())?;
        let gate = ConcurrencyGate::new(self.config.max_concurrency())?;
        let cache = self
            .cache
            .unwrap_or_else(|| cache::from_config(&self.config));
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(HttpConnector));

        tracing::debug!(
            rate_limit = self.config.rate_limit(),
            burst_limit = self.config.burst_limit(),
            max_concurrency = self.config.max_concurrency(),
            cache = %cache.backend(),
            "Client created"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                config: self.config,
                limiter,
                gate,
                cache,
                in_flight: InFlight::default(),
                connector,
                transport: Mutex::new(None),
                counters: Counters::default(),
            }),
            cancel: CancellationToken::new(),
        })
    }
}

impl Client {
    /// Create a client that talks HTTP to the configured base URL
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Create a client from `TROVE_API_KEY` and optional `TROVE_MASTER_*` overrides
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }

    pub fn builder(config: Config) -> ClientBuilder {
        ClientBuilder {
            config,
            connector: None,
            cache: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// A handle sharing this client's state whose operations stop with
    /// [`ArchiveError::Cancelled`] once `token` fires
    pub fn with_cancellation(&self, token: CancellationToken) -> Client {
        Client {
            inner: Arc::clone(&self.inner),
            cancel: token,
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cache(&self) -> Arc<dyn Cache> {
        Arc::clone(&self.inner.cache)
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.inner.gate
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    pub fn stats(&self) -> ClientStats {
        let counters = &self.inner.counters;
        ClientStats {
            transport_calls: counters.transport_calls.load(Ordering::Relaxed),
            cache_hits: counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: counters.cache_misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached response
    pub async fn clear_cache(&self) {
        self.inner.cache.clear().await;
    }

    /// Whether a scope is currently open
    pub fn is_open(&self) -> bool {
        self.inner.transport.lock().is_some()
    }

    /// Open a usage scope, establishing the connection pool.
    ///
    /// Only one scope may be open at a time. The returned [`Session`]
    /// releases the pool when closed or dropped.
    pub fn open(&self) -> Result<Session> {
        let mut slot = self.inner.transport.lock();
        if slot.is_some() {
            return Err(ArchiveError::Lifecycle(
                "a client scope is already open".to_string(),
            ));
        }
        let transport = self.inner.connector.connect(&self.inner.config)?;
        *slot = Some(transport);
        tracing::info!("Client scope opened");

        Ok(Session {
            inner: Arc::clone(&self.inner),
            released: false,
        })
    }

    /// Run `f` inside a scope that is released however `f` ends
    pub async fn scoped<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = self.open()?;
        let result = f(self.clone()).await;
        session.close();
        result
    }

    fn transport(&self) -> Result<Arc<dyn Transport>> {
        self.inner.transport.lock().clone().ok_or_else(|| {
            ArchiveError::Lifecycle("no open client scope; call Client::open first".to_string())
        })
    }

    /// Fail with a lifecycle error unless a scope is open
    pub(crate) fn ensure_open(&self) -> Result<()> {
        self.transport().map(|_| ())
    }

    /// Run `fut` unless the cancellation token fires first
    async fn guarded<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ArchiveError::Cancelled),
            out = fut => Ok(out),
        }
    }

    fn ttl_for(&self, kind: RequestKind) -> Option<Duration> {
        match kind {
            RequestKind::Search | RequestKind::Count => self.inner.config.search_ttl(),
            RequestKind::Record | RequestKind::FullText => self.inner.config.record_ttl(),
        }
    }

    async fn cached(&self, key: &CacheKey, request: &ApiRequest) -> Option<Value> {
        let entry = self.inner.cache.get(key).await?;
        self.inner.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(kind = request.kind().as_str(), path = request.path(), key = %key, "Cache hit");
        Some(entry.payload)
    }

    /// One upstream attempt: a fresh rate limiter token, then the transport call
    async fn attempt(&self, transport: &dyn Transport, request: &ApiRequest) -> Result<Value> {
        self.inner.limiter.acquire().await;
        self.inner
            .counters
            .transport_calls
            .fetch_add(1, Ordering::Relaxed);
        Ok(transport.execute(request).await?)
    }

    /// Send one request through cache, key claim, gate, limiter and transport
    pub(crate) async fn dispatch(&self, request: ApiRequest) -> Result<Value> {
        let transport = self.transport()?;
        if self.cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }

        let key = request.fingerprint();
        if let Some(payload) = self.cached(&key, &request).await {
            return Ok(payload);
        }

        // without a cache there is no response to share, so nothing to wait for
        let _claim = match self.inner.cache.backend() {
            CacheBackend::Disabled => None,
            _ => {
                let claim = self.guarded(self.inner.in_flight.claim(&key)).await?;
                if let Some(payload) = self.cached(&key, &request).await {
                    return Ok(payload);
                }
                Some(claim)
            }
        };

        let _permit = self.guarded(self.inner.gate.acquire()).await??;
        self.inner.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(kind = request.kind().as_str(), path = request.path(), "Cache miss");

        let retry = self.inner.config.retry();
        let payload = self
            .guarded(with_retry(retry, || self.attempt(transport.as_ref(), &request)))
            .await??;

        self.inner
            .cache
            .set(key, payload.clone(), self.ttl_for(request.kind()))
            .await;
        Ok(payload)
    }
}

/// An open client scope.
///
/// The connection pool is released exactly once, on [`Session::close`] or
/// when the guard drops (including during unwinding).
#[must_use = "the scope closes as soon as the session is dropped"]
pub struct Session {
    inner: Arc<ClientInner>,
    released: bool,
}

impl Session {
    /// End the scope now
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let transport = self.inner.transport.lock().take();
        if let Some(transport) = transport {
            self.inner.connector.release(transport);
            tracing::info!("Client scope closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("released", &self.released)
            .finish()
    }
}
