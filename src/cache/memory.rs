//! In-process cache backed by moka.

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use serde_json::Value;
use std::time::{Duration, Instant};

use super::{Cache, CacheEntry, CacheKey};
use crate::config::CacheBackend;

/// Per-entry expiry read from the stored [`CacheEntry`]
struct EntryExpiry;

impl Expiry<CacheKey, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.remaining()
    }
}

/// Bounded in-memory cache with optional per-entry TTL.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    entries: MokaCache<CacheKey, CacheEntry>,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: u64) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(capacity)
            .expire_after(EntryExpiry)
            .build();
        Self { entries }
    }

    /// Approximate number of live entries
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn backend(&self) -> CacheBackend {
        CacheBackend::Memory
    }

    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.get(key).await?;
        // moka expires lazily; never serve an entry past its deadline
        if entry.is_expired() {
            self.entries.invalidate(key).await;
            return None;
        }
        Some(entry)
    }

    async fn set(&self, key: CacheKey, payload: Value, ttl: Option<Duration>) {
        self.entries.insert(key, CacheEntry::new(payload, ttl)).await;
    }

    async fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ApiRequest, RequestKind};
    use serde_json::json;

    fn key(path: &str) -> CacheKey {
        ApiRequest::new(RequestKind::Record, path).fingerprint()
    }

    #[tokio::test]
    async fn test_set_get_clear() {
        let cache = MemoryCache::new(100);

        assert!(cache.get(&key("work/1")).await.is_none());

        cache.set(key("work/1"), json!({"id": "1"}), None).await;
        let entry = cache.get(&key("work/1")).await.unwrap();
        assert_eq!(entry.payload["id"], "1");

        assert!(cache.get(&key("work/2")).await.is_none());

        cache.clear().await;
        assert!(cache.get(&key("work/1")).await.is_none());
    }

    #[tokio::test]
    async fn test_entries_age_out() {
        let cache = MemoryCache::new(100);
        cache
            .set(key("work/1"), json!(1), Some(Duration::from_millis(20)))
            .await;
        cache.set(key("work/2"), json!(2), None).await;

        assert!(cache.get(&key("work/1")).await.is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cache.get(&key("work/1")).await.is_none());
        assert!(cache.get(&key("work/2")).await.is_some());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_payload() {
        let cache = MemoryCache::new(10);
        cache.set(key("list/5"), json!("old"), None).await;
        cache.set(key("list/5"), json!("new"), None).await;
        assert_eq!(cache.get(&key("list/5")).await.unwrap().payload, json!("new"));
    }
}
