//! Coordinator statistics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time view of a coordinator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    /// Entries in the positive cache, including expired ones not yet swept
    pub cache_size: usize,
    /// Entries in the negative cache
    pub error_cache_size: usize,
    /// Resolutions currently in flight
    pub pending_count: usize,
    /// `(key, operation)` pairs with recorded failures
    pub retry_state_count: usize,
    /// Lookups answered from the positive cache
    pub cache_hits: u64,
    /// Lookups the positive cache could not answer
    pub cache_misses: u64,
    /// Lookups answered with a fallback because of a negative-cache entry
    pub negative_hits: u64,
    /// Calls made to the fetcher
    pub fetch_attempts: u64,
    /// Fallback values returned to callers
    pub fallbacks_served: u64,
}

#[derive(Debug, Default)]
pub(crate) struct CoordinatorMetrics {
    negative_hits: AtomicU64,
    fetch_attempts: AtomicU64,
    fallbacks_served: AtomicU64,
}

impl CoordinatorMetrics {
    pub(crate) fn record_negative_hit(&self) {
        self.negative_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch_attempt(&self) {
        self.fetch_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback(&self) {
        self.fallbacks_served.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn negative_hits(&self) -> u64 {
        self.negative_hits.load(Ordering::Relaxed)
    }

    pub(crate) fn fetch_attempts(&self) -> u64 {
        self.fetch_attempts.load(Ordering::Relaxed)
    }

    pub(crate) fn fallbacks_served(&self) -> u64 {
        self.fallbacks_served.load(Ordering::Relaxed)
    }
}
