//! # ProfileCache Core
//!
//! The resilient fetch-cache layer.
//!
//! This crate contains:
//! - Positive and negative caches with per-entry TTLs ([`store`])
//! - Per-key exponential backoff ([`retry`])
//! - Request coalescing ([`pending`])
//! - Deterministic degraded values ([`fallback`])
//! - The [`CacheCoordinator`] that ties them together, and the [`Janitor`]
//!   that sweeps expired state in the background
//!
//! ## Architecture Principles
//! - Depends only on `profilecache-common` and `profilecache-domain`
//! - No HTTP or file IO; the network call comes in through the [`Fetcher`]
//!   port
//! - Every time decision goes through an injected
//!   [`Clock`](profilecache_common::Clock)

pub mod coordinator;
pub mod fallback;
pub mod janitor;
pub mod pending;
pub mod ports;
pub mod retry;
pub mod store;

pub use coordinator::{
    CacheCoordinator, CacheCoordinatorBuilder, ConfigError, CoordinatorConfig,
    CoordinatorConfigBuilder, CoordinatorStats,
};
pub use fallback::{PooledFallback, ProfileFallback};
pub use janitor::{Janitor, JanitorError, JanitorResult, Sweep, SweepReport};
pub use pending::{PendingError, PendingRequestRegistry};
pub use ports::{FallbackProvider, Fetcher};
pub use retry::{BackoffPolicy, RetryError, RetryExecutor, RetryState};
pub use store::{CacheEntry, CacheStore, ErrorCache, ErrorEntry, StoreStats};
