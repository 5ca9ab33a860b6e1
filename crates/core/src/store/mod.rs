//! Keyed stores with per-entry time-to-live
//!
//! - **[`CacheStore`]**: resolved values (positive cache)
//! - **[`ErrorCache`]**: classified failures (negative cache), one entry per
//!   `(key, class)` pair
//!
//! Both expire lazily on read and in bulk through `sweep`. Neither holds its
//! lock across an `.await`.

pub mod cache_store;
pub mod error_cache;
pub mod stats;

use std::time::{Duration, Instant};

pub use cache_store::{CacheEntry, CacheStore};
pub use error_cache::{ErrorCache, ErrorEntry};
pub use stats::StoreStats;

/// An entry stored at `stored_at` with `ttl` is stale once strictly more than
/// `ttl` has elapsed.
pub(crate) fn is_expired(stored_at: Instant, ttl: Duration, now: Instant) -> bool {
    now.saturating_duration_since(stored_at) > ttl
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let stored_at = Instant::now();
        let ttl = Duration::from_secs(10);

        assert!(!is_expired(stored_at, ttl, stored_at + ttl));
        assert!(is_expired(stored_at, ttl, stored_at + ttl + Duration::from_millis(1)));
    }

    #[test]
    fn test_clock_going_backwards_is_not_expired() {
        let now = Instant::now();
        let stored_at = now + Duration::from_secs(5);
        assert!(!is_expired(stored_at, Duration::ZERO, now));
    }
}
