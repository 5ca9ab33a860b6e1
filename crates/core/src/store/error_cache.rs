//! Negative cache of classified failures

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use profilecache_common::{Clock, ErrorClass};

use super::is_expired;
use super::stats::{MetricsCollector, StoreStats};

/// A remembered failure for one key and class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    pub error_class: ErrorClass,
    pub message: String,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl ErrorEntry {
    /// Whether the entry is stale at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        is_expired(self.stored_at, self.ttl, now)
    }

    /// Time left before the entry expires, zero once it has
    pub fn remaining(&self, now: Instant) -> Duration {
        (self.stored_at + self.ttl).saturating_duration_since(now)
    }
}

/// Keyed storage of classified failures
///
/// Entries are keyed by `(key, class)`, so a key can hold, say, a
/// `RateLimited` and a `ServerError` entry at once, each expiring on its own
/// TTL. The TTL is always supplied by the caller.
pub struct ErrorCache {
    entries: Mutex<HashMap<(String, ErrorClass), ErrorEntry>>,
    clock: Arc<dyn Clock>,
    metrics: MetricsCollector,
}

impl ErrorCache {
    /// Create an empty cache reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), clock, metrics: MetricsCollector::default() }
    }

    /// Live entry for `(key, class)`, removing it if it has expired
    pub fn get(&self, key: &str, class: ErrorClass) -> Option<ErrorEntry> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let found = Self::take_live(&mut entries, key, class, now, &self.metrics);

        if found.is_some() {
            self.metrics.record_hit();
        } else {
            self.metrics.record_miss();
        }
        found
    }

    /// First live entry for `key` over all classes, in [`ErrorClass::ALL`]
    /// order
    pub fn find(&self, key: &str) -> Option<ErrorEntry> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let mut found = None;
        for class in ErrorClass::ALL {
            if let Some(entry) = Self::take_live(&mut entries, key, class, now, &self.metrics) {
                found = Some(entry);
                break;
            }
        }

        if found.is_some() {
            self.metrics.record_hit();
        } else {
            self.metrics.record_miss();
        }
        found
    }

    /// Remember a failure for `(key, class)`, replacing any previous entry
    pub fn set(&self, key: &str, class: ErrorClass, message: impl Into<String>, ttl: Duration) {
        let entry = ErrorEntry {
            error_class: class,
            message: message.into(),
            stored_at: self.clock.now(),
            ttl,
        };
        self.entries.lock().insert((key.to_string(), class), entry);
        self.metrics.record_insert();
    }

    /// Remove every class for `key`; returns how many entries were dropped
    pub fn invalidate(&self, key: &str) -> usize {
        let mut entries = self.entries.lock();
        ErrorClass::ALL
            .into_iter()
            .filter(|class| entries.remove(&(key.to_string(), *class)).is_some())
            .count()
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

    /// Whether the cache holds no entries
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

    fn take_live(
        entries: &mut HashMap<(String, ErrorClass), ErrorEntry>,
        key: &str,
        class: ErrorClass,
        now: Instant,
        metrics: &MetricsCollector,
    ) -> Option<ErrorEntry> {
        let slot = (key.to_string(), class);
        match entries.get(&slot) {
            Some(entry) if !entry.is_expired(now) => Some(entry.clone()),
            Some(_) => {
                entries.remove(&slot);
                metrics.record_expirations(1);
                None
            }
            None => None,
        }
    }
}

impl std::fmt::Debug for ErrorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorCache").field("len", &self.entries.lock().len()).finish()
    }
}
