//! Key-value cache collaborator with in-memory and JSON file backends.

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::atomic_file::write_atomically;
use crate::clock::{Clock, SystemClock};
use crate::UtcDateTime;

pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Abstract string key-value store with per-entry retention.
///
/// Backends may evict an entry any time after `ttl` has elapsed; callers must
/// treat `None` as "never stored".
pub trait CacheBackend: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;

    fn set<'a>(&'a self, key: String, value: String, ttl: Duration) -> CacheFuture<'a, ()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    expires_at: UtcDateTime,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
}

impl CacheInner {
    fn get(&self, key: &str, now: UtcDateTime) -> Option<String> {
        self.map.get(key).and_then(|entry| {
            if now <= entry.expires_at {
                Some(entry.body.clone())
            } else {
                None
            }
        })
    }

    /// Stores `body` and drops every entry whose retention has elapsed.
    fn put(&mut self, key: String, body: String, expires_at: UtcDateTime, now: UtcDateTime) {
        self.map.retain(|_, entry| entry.expires_at >= now);
        self.map.insert(key, CacheEntry { body, expires_at });
    }
}

/// Thread-safe in-memory cache backend.
#[derive(Debug, Clone)]
pub struct MemoryCacheStore {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner::default())),
            clock,
        }
    }

    /// Number of stored entries. Expired ones linger until the next `set`.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CacheBackend for MemoryCacheStore {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
        Box::pin(async move {
            let now = self.clock.now();
            self.inner.read().await.get(key, now)
        })
    }

    fn set<'a>(&'a self, key: String, value: String, ttl: Duration) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            let now = self.clock.now();
            self.inner
                .write()
                .await
                .put(key, value, now.saturating_add(ttl), now);
        })
    }
}

/// Cache persisted as one JSON object so entries outlive the process.
///
/// Read failures and undecodable files behave as an empty cache; write
/// failures are logged and dropped.
#[derive(Debug)]
pub struct JsonFileCacheStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_inner(&self) -> CacheInner {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return CacheInner::default(),
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "cache file unreadable");
                return CacheInner::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|error| {
            tracing::warn!(path = %self.path.display(), %error, "discarding undecodable cache file");
            CacheInner::default()
        })
    }
}

impl CacheBackend for JsonFileCacheStore {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
        Box::pin(async move { self.read_inner().await.get(key, self.clock.now()) })
    }

    fn set<'a>(&'a self, key: String, value: String, ttl: Duration) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let now = self.clock.now();
            let mut inner = self.read_inner().await;
            inner.put(key, value, now.saturating_add(ttl), now);

            let written = match serde_json::to_string(&inner) {
                Ok(raw) => write_atomically(&self.path, raw).await,
                Err(error) => Err(error.into()),
            };
            if let Err(error) = written {
                tracing::warn!(path = %self.path.display(), %error, "failed to persist cache");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (MemoryCacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (MemoryCacheStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_cache_store_basic_operations() {
        let (cache, _) = store();

        assert!(cache.get("key1").await.is_none());

        cache
            .set("key1".to_string(), "value1".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("key1").await, Some("value1".to_string()));

        cache
            .set("key1".to_string(), "value2".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("key1").await, Some("value2".to_string()));
    }

    #[tokio::test]
    async fn test_cache_expiration_follows_the_clock() {
        let (cache, clock) = store();

        cache
            .set("key1".to_string(), "value1".to_string(), Duration::from_secs(60))
            .await;

        clock.advance(Duration::from_secs(60));
        assert!(cache.get("key1").await.is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("key1").await.is_none());
    }

    #[tokio::test]
    async fn set_prunes_entries_past_retention() {
        let (cache, clock) = store();

        cache
            .set("short".to_string(), "a".to_string(), Duration::from_secs(1))
            .await;
        cache
            .set("long".to_string(), "b".to_string(), Duration::from_secs(600))
            .await;
        assert_eq!(cache.len().await, 2);

        clock.advance(Duration::from_secs(5));
        cache
            .set("fresh".to_string(), "c".to_string(), Duration::from_secs(60))
            .await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("short").await.is_none());
        assert_eq!(cache.get("long").await, Some("b".to_string()));
    }

    #[tokio::test]
    async fn file_store_entries_survive_a_new_instance() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache").join("market.json");
        let clock = Arc::new(ManualClock::default());

        let first = JsonFileCacheStore::with_clock(&path, clock.clone());
        first
            .set("quotes:bitcoin".to_string(), "{}".to_string(), Duration::from_secs(60))
            .await;
        first
            .set("short".to_string(), "x".to_string(), Duration::from_secs(1))
            .await;

        clock.advance(Duration::from_secs(30));
        let second = JsonFileCacheStore::with_clock(&path, clock.clone());
        assert_eq!(second.get("quotes:bitcoin").await, Some("{}".to_string()));
        assert!(second.get("short").await.is_none());

        second
            .set("quotes:ethereum".to_string(), "[]".to_string(), Duration::from_secs(60))
            .await;
        let raw = std::fs::read_to_string(&path).expect("cache file");
        assert!(!raw.contains("\"short\""));
        assert!(raw.contains("quotes:ethereum"));
    }

    #[tokio::test]
    async fn corrupt_cache_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("market.json");
        std::fs::write(&path, "{not json").expect("write");

        let cache = JsonFileCacheStore::new(&path);
        assert!(cache.get("anything").await.is_none());

        cache
            .set("key".to_string(), "value".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("key").await, Some("value".to_string()));
    }
}
