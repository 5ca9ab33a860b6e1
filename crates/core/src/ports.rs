//! Port interfaces for the cache layer
//!
//! These traits define the boundaries between the coordinator and the
//! outside world: where values come from, and what to serve when they
//! cannot be had.

use async_trait::async_trait;
use profilecache_common::FetchError;

/// Performs the network call for one key
///
/// Implementations should map transport failures onto [`FetchError`] so
/// that the coordinator can classify them; they need not retry or cache.
#[async_trait]
pub trait Fetcher<V>: Send + Sync {
    /// Fetch the current value for `key`
    async fn fetch(&self, key: &str) -> Result<V, FetchError>;
}

/// Supplies a degraded value when a real one cannot be obtained
///
/// Must be total and deterministic: the same key always yields an equal
/// value, and no key may cause a failure.
pub trait FallbackProvider<V>: Send + Sync {
    /// Degraded value for `key`
    fn fallback(&self, key: &str) -> V;
}
