//! Positive cache of resolved values

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use profilecache_common::Clock;

use super::is_expired;
use super::stats::{MetricsCollector, StoreStats};

/// A resolved value and when it stops being fresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Whether the entry is stale at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        is_expired(self.stored_at, self.ttl, now)
    }
}

/// Keyed storage of resolved values with per-entry TTL
///
/// Expired entries are removed the first time a read finds them, or by
/// [`CacheStore::sweep`], whichever comes first.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use profilecache_common::MockClock;
/// use profilecache_core::CacheStore;
///
/// let clock = MockClock::new();
/// let store = CacheStore::new(Arc::new(clock.clone()));
/// store.set("u1", "Ada".to_string(), Duration::from_secs(60));
/// assert_eq!(store.get("u1").as_deref(), Some("Ada"));
///
/// clock.advance(Duration::from_secs(61));
/// assert_eq!(store.get("u1"), None);
/// ```
pub struct CacheStore<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
    metrics: MetricsCollector,
}

impl<V: Clone> CacheStore<V> {
    /// Create an empty store reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), clock, metrics: MetricsCollector::default() }
    }

    /// Live value for `key`, removing it if it has expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.metrics.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.metrics.record_expirations(1);
                self.metrics.record_miss();
                None
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Like [`get`](Self::get) but leaves counters and expired entries alone
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        self.entries
            .lock()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Store `value` under `key`, replacing any previous entry
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let entry = CacheEntry { value, stored_at: self.clock.now(), ttl };
        self.entries.lock().insert(key.to_string(), entry);
        self.metrics.record_insert();
    }

    /// Remove `key`; returns whether an entry was present
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Remove every entry that is stale at `now`
    pub fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        self.metrics.record_expirations(removed);
        removed
    }

    /// Number of entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Counter snapshot
    pub fn stats(&self) -> StoreStats {
        self.metrics.snapshot(self.len())
    }
}

impl<V> std::fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore").field("len", &self.entries.lock().len()).finish()
    }
}
