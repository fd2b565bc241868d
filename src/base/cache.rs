//! Time-bounded memoization for remote lookups.
//!
//! Entries expire lazily: an expired entry is treated as absent and is simply
//! overwritten by the next successful fetch. Nothing sweeps cold entries.

use std::{collections::HashMap, hash::Hash, future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};

// Clocks.

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += TimeDelta::from_std(by).unwrap_or(TimeDelta::zero());
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// Cache.

#[derive(Debug, Clone)]
struct TtlEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Key/value store whose entries are live for a fixed TTL after insertion.
///
/// Misses are serialized through a single fetch lock per cache instance, so at
/// most one supplier runs at a time no matter which key it is for. Unrelated
/// misses queue behind each other; that is the price of never issuing two
/// remote calls for the same key.
pub struct TtlCache<K, V> {
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<K, TtlEntry<V>>>,
    fetch_lock: tokio::sync::Mutex<()>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache backed by the wall clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache backed by the given clock.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::days(365)),
            clock,
            entries: RwLock::new(HashMap::new()),
            fetch_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Return the live value for `key`, or run `supplier` and memoize its result.
    ///
    /// A failed supplier leaves the cache untouched, so the next lookup fetches again.
    pub async fn get<F, Fut, E>(&self, key: K, supplier: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.peek(&key) {
            return Ok(value);
        }

        let _guard = self.fetch_lock.lock().await;

        // Whoever held the lock before us may have just filled this key.
        if let Some(value) = self.peek(&key) {
            return Ok(value);
        }

        let value = supplier().await?;
        self.insert(key, value.clone());

        Ok(value)
    }

    /// Return the value for `key` if it is still live.
    pub fn peek(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read();

        entries.get(key).filter(|entry| now < entry.expires_at).map(|entry| entry.value.clone())
    }

    /// Store `value` with a fresh expiry.
    pub fn insert(&self, key: K, value: V) {
        let expires_at = self.clock.now() + self.ttl;
        self.entries.write().insert(key, TtlEntry { value, expires_at });
    }

    /// Mutate the live entry for `key` in place, keeping its expiry.
    ///
    /// Returns `false` (and does not call `f`) when there is no live entry.
    pub fn update<F>(&self, key: &K, f: F) -> bool
    where
        F: FnOnce(&mut V),
    {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        match entries.get_mut(key) {
            Some(entry) if now < entry.expires_at => {
                f(&mut entry.value);
                true
            }
            _ => false,
        }
    }

    /// Evict `key` regardless of its expiry.
    pub fn clear(&self, key: &K) {
        self.entries.write().remove(key);
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;

    use super::*;
    use crate::base::types::Res;

    const TTL: Duration = Duration::from_secs(5);

    fn cache_with_clock() -> (TtlCache<String, String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (TtlCache::with_clock(TTL, clock.clone()), clock)
    }

    async fn counted_get(cache: &TtlCache<String, String>, calls: &AtomicUsize, value: &str) -> Res<String> {
        cache
            .get("key".to_string(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value.to_string())
            })
            .await
    }

    #[tokio::test]
    async fn test_get_within_ttl_does_not_refetch() {
        let (cache, clock) = cache_with_clock();
        let calls = AtomicUsize::new(0);

        let first = counted_get(&cache, &calls, "one").await.unwrap();
        clock.advance(Duration::from_secs(4));
        let second = counted_get(&cache, &calls, "two").await.unwrap();

        assert_eq!(first, "one");
        assert_eq!(second, "one");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_after_ttl_refetches() {
        let (cache, clock) = cache_with_clock();
        let calls = AtomicUsize::new(0);

        counted_get(&cache, &calls, "one").await.unwrap();
        clock.advance(TTL);
        let second = counted_get(&cache, &calls, "two").await.unwrap();

        assert_eq!(second, "two");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_entry_expires_exactly_at_ttl() {
        let (cache, clock) = cache_with_clock();
        let start = clock.now();

        cache.insert("key".to_string(), "value".to_string());

        clock.set(start + TimeDelta::seconds(5) - TimeDelta::nanoseconds(1));
        assert_eq!(cache.peek(&"key".to_string()).as_deref(), Some("value"));

        clock.set(start + TimeDelta::seconds(5));
        assert!(cache.peek(&"key".to_string()).is_none());

        // A clock that steps back makes the entry live again.
        clock.set(start);
        assert_eq!(cache.peek(&"key".to_string()).as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let (cache, _clock) = cache_with_clock();
        let calls = AtomicUsize::new(0);

        counted_get(&cache, &calls, "one").await.unwrap();
        cache.clear(&"key".to_string());
        let second = counted_get(&cache, &calls, "two").await.unwrap();

        assert_eq!(second, "two");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_memoized() {
        let (cache, _clock) = cache_with_clock();
        let calls = AtomicUsize::new(0);

        let failed: Res<String> = cache
            .get("key".to_string(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("remote unavailable"))
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.peek(&"key".to_string()).is_none());

        let value = counted_get(&cache, &calls, "recovered").await.unwrap();

        assert_eq!(value, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let (cache, _clock) = cache_with_clock();
        let calls = AtomicUsize::new(0);

        let lookups = (0..8).map(|_| async {
            cache
                .get("key".to_string(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Ok::<_, anyhow::Error>("shared".to_string())
                })
                .await
        });
        let results = futures::future::join_all(lookups).await;

        assert!(results.iter().all(|r| r.as_deref().ok() == Some("shared")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_only_touches_live_entries() {
        let (cache, clock) = cache_with_clock();

        assert!(!cache.update(&"key".to_string(), |v| v.push('!')));

        cache.insert("key".to_string(), "value".to_string());
        assert!(cache.update(&"key".to_string(), |v| v.push('!')));
        assert_eq!(cache.peek(&"key".to_string()).as_deref(), Some("value!"));

        clock.advance(TTL);
        assert!(!cache.update(&"key".to_string(), |v| v.push('?')));
        assert!(cache.peek(&"key".to_string()).is_none());
    }
}
