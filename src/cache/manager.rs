//! In-memory cache manager for computed results
//!
//! Provides a `CacheManager` that memoizes values under string keys until they
//! are explicitly evicted. Values are handed out as `Arc`s, so repeated reads of
//! the same entry return the same allocation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Wrapper struct for a cached value
#[derive(Debug)]
struct CacheEntry<T> {
    /// The cached data
    data: Arc<T>,
    /// When the data was cached
    cached_at: DateTime<Utc>,
}

/// Result of reading from cache
#[derive(Debug)]
pub struct CachedData<T> {
    /// The cached data
    pub data: Arc<T>,
    /// When the data was originally cached
    pub cached_at: DateTime<Utc>,
}

/// Memoizes values under string keys until evicted
///
/// Entries are stored and removed whole under a lock that is never held across
/// an `.await`. Two callers that miss at the same time may both compute; the
/// later write wins.
#[derive(Debug)]
pub struct CacheManager<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
}

impl<T> Default for CacheManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CacheManager<T> {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Reads the entry for `key`, if present
    pub fn read(&self, key: &str) -> Option<CachedData<T>> {
        self.entries.read().get(key).map(|entry| CachedData {
            data: Arc::clone(&entry.data),
            cached_at: entry.cached_at,
        })
    }

    /// Stores `data` under `key`, replacing any previous entry
    pub fn write(&self, key: &str, data: T) -> Arc<T> {
        let data = Arc::new(data);
        let entry = CacheEntry {
            data: Arc::clone(&data),
            cached_at: Utc::now(),
        };
        self.entries.write().insert(key.to_string(), entry);
        data
    }

    /// Removes the entry for `key`
    ///
    /// Returns true if an entry was present.
    pub fn evict(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Returns true if `key` currently has an entry
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Returns the cached value for `key`, computing and storing it on a miss
    ///
    /// If `compute` fails nothing is stored and the error is returned.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, compute: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.read(key) {
            tracing::debug!(key, "Cache hit");
            return Ok(cached.data);
        }

        tracing::debug!(key, "Cache miss, computing");
        let data = compute().await?;
        Ok(self.write(key, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn test_data(name: &str, value: i32) -> TestData {
        TestData {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_read_returns_none_for_missing_key() {
        let cache: CacheManager<TestData> = CacheManager::new();
        assert!(cache.read("nonexistent_key").is_none());
    }

    #[test]
    fn test_write_then_read() {
        let cache = CacheManager::new();
        let data = test_data("fresh", 100);

        cache.write("fresh_key", data.clone());

        let result = cache.read("fresh_key").expect("Should read cache");
        assert_eq!(*result.data, data);
    }

    #[test]
    fn test_overwrite_existing_entry() {
        let cache = CacheManager::new();

        cache.write("overwrite_key", test_data("first", 1));
        cache.write("overwrite_key", test_data("second", 2));

        let result = cache.read("overwrite_key").expect("Should read cache");
        assert_eq!(*result.data, test_data("second", 2));
    }

    #[test]
    fn test_evict_removes_entry() {
        let cache = CacheManager::new();
        cache.write("key", test_data("a", 1));

        assert!(cache.evict("key"));
        assert!(!cache.contains("key"));
        assert!(!cache.evict("key"), "second evict finds nothing");
    }

    #[test]
    fn test_evict_leaves_other_keys() {
        let cache = CacheManager::new();
        cache.write("a", test_data("a", 1));
        cache.write("b", test_data("b", 2));

        cache.evict("a");

        assert!(cache.contains("b"));
    }

    #[test]
    fn test_cached_at_timestamp_is_recorded() {
        let cache = CacheManager::new();

        let before = Utc::now();
        cache.write("timestamp_key", test_data("t", 999));
        let after = Utc::now();

        let result = cache.read("timestamp_key").expect("Should read cache");
        assert!(result.cached_at >= before);
        assert!(result.cached_at <= after);
    }

    #[tokio::test]
    async fn test_get_or_compute_memoizes() {
        let cache = CacheManager::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let compute = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(test_data("computed", 7))
        };

        let first = cache.get_or_compute("key", compute).await.unwrap();
        let second = cache.get_or_compute("key", compute).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_get_or_compute_recomputes_after_evict() {
        let cache = CacheManager::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let compute = move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(test_data("computed", n as i32))
        };

        let first = cache.get_or_compute("key", compute).await.unwrap();
        cache.evict("key");
        let second = cache.get_or_compute("key", compute).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(first.value, 0);
        assert_eq!(second.value, 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_failure_stores_nothing() {
        let cache: CacheManager<TestData> = CacheManager::new();

        let result = cache
            .get_or_compute("key", || async { Err::<TestData, _>("boom".to_string()) })
            .await;

        assert_eq!(result.unwrap_err(), "boom");
        assert!(!cache.contains("key"));
    }
}
