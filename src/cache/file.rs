//! File-based cache backend.
//!
//! Each entry is one JSON file named after its key:
//!
//! ```text
//! ~/.cache/trove-master/
//!   responses/
//!     <md5>.json
//! ```
//!
//! Unreadable, corrupt or expired files are treated as misses. Write
//! failures are logged and otherwise ignored.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;

use super::{Cache, CacheEntry, CacheKey};
use crate::config::CacheBackend;

/// Distinguishes temp files of concurrent writers within this process
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Persistent cache storing one JSON file per entry
#[derive(Debug, Clone)]
pub struct FileCache {
    base_dir: PathBuf,
    response_dir: PathBuf,
}

impl FileCache {
    /// Create a file cache rooted at `base_dir`. Directories are created lazily.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let response_dir = base_dir.join("responses");
        Self {
            base_dir,
            response_dir,
        }
    }

    /// Cache root directory
    pub fn cache_dir(&self) -> &Path {
        &self.base_dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.response_dir.join(format!("{}.json", key))
    }

    async fn read_entry(path: &Path) -> std::io::Result<CacheEntry> {
        let content = fs::read(path).await?;
        serde_json::from_slice(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    async fn write_entry(&self, path: &Path, entry: &CacheEntry) -> std::io::Result<()> {
        fs::create_dir_all(&self.response_dir).await?;
        let content = serde_json::to_vec(entry)?;

        // write-then-rename so concurrent readers never see a partial file;
        // each writer gets its own temp file
        let tmp = path.with_extension(format!(
            "json.{}.{}.tmp",
            std::process::id(),
            WRITE_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, content).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl Cache for FileCache {
    fn backend(&self) -> CacheBackend {
        CacheBackend::File
    }

    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        match Self::read_entry(&path).await {
            Ok(entry) if entry.is_expired() => {
                tracing::debug!("Cache expired: {}", key);
                let _ = fs::remove_file(&path).await;
                None
            }
            Ok(entry) => Some(entry),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn set(&self, key: CacheKey, payload: Value, ttl: Option<Duration>) {
        let path = self.entry_path(&key);
        let entry = CacheEntry::new(payload, ttl);

        if let Err(e) = self.write_entry(&path, &entry).await {
            tracing::warn!("Failed to write cache entry {}: {}", key, e);
        }
    }

    async fn clear(&self) {
        match fs::remove_dir_all(&self.response_dir).await {
            Ok(()) => tracing::info!("Cache cleared at: {}", self.base_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to clear cache: {}", e),
        }
    }
}
