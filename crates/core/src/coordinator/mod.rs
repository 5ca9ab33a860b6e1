//! The single entry point consumers call
//!
//! [`CacheCoordinator::get`] answers from, in order:
//!
//! 1. the positive cache;
//! 2. the negative cache, by serving a fallback without touching the network;
//! 3. an in-flight resolution for the same key, if one exists;
//! 4. a new resolution: fetch attempts under the retry budget until one
//!    succeeds (cache and return it) or the budget is spent (classify the last
//!    failure, cache it under its class TTL, return a fallback).
//!
//! `get` always returns a value. Failures, timeouts and even a panicking
//! fetcher all end in a fallback; a resolution that dies without a result is
//! negative-cached as [`ErrorClass::Unknown`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use profilecache_common::FetchError;
//! use profilecache_core::{CacheCoordinator, CoordinatorConfig, Fetcher, PooledFallback};
//!
//! struct Upper;
//!
//! #[async_trait]
//! impl Fetcher<String> for Upper {
//!     async fn fetch(&self, key: &str) -> Result<String, FetchError> {
//!         Ok(key.to_uppercase())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = CacheCoordinator::<String>::new(
//!     CoordinatorConfig::default(),
//!     Arc::new(Upper),
//!     Arc::new(PooledFallback::single("?".to_string())),
//! )?;
//!
//! assert_eq!(coordinator.get("ada").await, "ADA");
//! assert_eq!(coordinator.stats().cache_size, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use profilecache_common::{
    Clock, ErrorClass, ErrorClassification, ErrorSeverity, FetchError, SystemClock,
};
use tracing::{debug, error, info, instrument, trace, warn};

pub use self::config::{
    default_error_ttl, ConfigError, CoordinatorConfig, CoordinatorConfigBuilder,
};
pub use self::stats::CoordinatorStats;
use self::stats::CoordinatorMetrics;
use crate::janitor::{Janitor, Sweep, SweepReport};
use crate::pending::{PendingError, PendingRequestRegistry};
use crate::ports::{FallbackProvider, Fetcher};
use crate::retry::{RetryError, RetryExecutor};
use crate::store::{CacheStore, ErrorCache};

/// Operation name under which fetch failures are tracked
pub const FETCH_OPERATION: &str = "fetch";

/// Result of one coalesced resolution, shared by every waiting caller
type Resolution<V> = Result<V, ErrorClass>;

struct Inner<V: Clone> {
    config: CoordinatorConfig,
    clock: Arc<dyn Clock>,
    fetcher: Arc<dyn Fetcher<V>>,
    fallback: Arc<dyn FallbackProvider<V>>,
    cache: CacheStore<V>,
    errors: ErrorCache,
    retry: RetryExecutor,
    pending: PendingRequestRegistry<Resolution<V>>,
    metrics: CoordinatorMetrics,
}

/// Coalescing, caching, retrying front for a [`Fetcher`]
///
/// Cloning is cheap; clones share all state.
pub struct CacheCoordinator<V: Clone> {
    inner: Arc<Inner<V>>,
}

impl<V: Clone> Clone for CacheCoordinator<V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<V> CacheCoordinator<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Start building a coordinator around `fetcher` and `fallback`
    pub fn builder(
        fetcher: Arc<dyn Fetcher<V>>,
        fallback: Arc<dyn FallbackProvider<V>>,
    ) -> CacheCoordinatorBuilder<V> {
        CacheCoordinatorBuilder {
            fetcher,
            fallback,
            clock: None,
            config: CoordinatorConfig::default(),
        }
    }

    /// Create a coordinator on the system clock
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` does not validate.
    pub fn new(
        config: CoordinatorConfig,
        fetcher: Arc<dyn Fetcher<V>>,
        fallback: Arc<dyn FallbackProvider<V>>,
    ) -> Result<Self, ConfigError> {
        Self::builder(fetcher, fallback).config(config).build()
    }

    /// Value for `key`: fresh, cached, or a fallback
    #[instrument(skip(self), level = "debug")]
    pub async fn get(&self, key: &str) -> V {
        let inner = &self.inner;

        if let Some(value) = inner.cache.get(key) {
            trace!("positive cache hit");
            return value;
        }

        if let Some(entry) = inner.errors.find(key) {
            inner.metrics.record_negative_hit();
            debug!(
                class = %entry.error_class,
                remaining_ms = entry.remaining(inner.clock.now()).as_millis() as u64,
                "negative cache hit, serving fallback"
            );
            return inner.serve_fallback(key);
        }

        let resolver = Arc::clone(inner);
        let owned_key = key.to_string();
        match inner.pending.coalesce(key, move || resolver.resolve(owned_key)).await {
            Ok(Ok(value)) => value,
            Ok(Err(_)) => inner.serve_fallback(key),
            Err(err) => {
                inner.cache_aborted(key, &err);
                inner.serve_fallback(key)
            }
        }
    }

    /// Drop everything known about `key`: cached value, cached failures and
    /// retry history
    ///
    /// An in-flight resolution is not cancelled and will populate the caches
    /// when it settles. It still stops after `max_attempts` fetches.
    pub fn invalidate(&self, key: &str) {
        let inner = &self.inner;
        let value = inner.cache.invalidate(key);
        let errors = inner.errors.invalidate(key);
        let retries = inner.retry.forget_key(key);
        debug!(key, value, errors, retries, "invalidated");
    }

    /// Drop all cached values, failures and retry history
    pub fn clear(&self) {
        self.inner.cache.clear();
        self.inner.errors.clear();
        self.inner.retry.clear();
        info!("cache coordinator cleared");
    }

    /// Counter snapshot
    pub fn stats(&self) -> CoordinatorStats {
        let inner = &self.inner;
        let cache = inner.cache.stats();
        CoordinatorStats {
            cache_size: cache.size,
            error_cache_size: inner.errors.len(),
            pending_count: inner.pending.len(),
            retry_state_count: inner.retry.len(),
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            negative_hits: inner.metrics.negative_hits(),
            fetch_attempts: inner.metrics.fetch_attempts(),
            fallbacks_served: inner.metrics.fallbacks_served(),
        }
    }

    /// Remove expired values, expired failures and idle retry state
    pub fn sweep(&self) -> SweepReport {
        let inner = &self.inner;
        let now = inner.clock.now();
        SweepReport {
            expired_values: inner.cache.sweep(now),
            expired_errors: inner.errors.sweep(now),
            stale_retry_states: inner.retry.sweep_idle(now, inner.config.retry_state_idle),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Clock the coordinator reads time from
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    /// A stopped janitor that sweeps this coordinator every
    /// `sweep_interval`
    pub fn janitor(&self) -> Janitor {
        Janitor::new(Arc::new(self.clone()), self.clock(), self.inner.config.sweep_interval)
    }
}

impl<V> Sweep for CacheCoordinator<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn sweep(&self) -> SweepReport {
        CacheCoordinator::sweep(self)
    }
}

impl<V: Clone> std::fmt::Debug for CacheCoordinator<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("config", &self.inner.config)
            .field("cache", &self.inner.cache)
            .field("errors", &self.inner.errors)
            .field("retry", &self.inner.retry)
            .field("pending", &self.inner.pending)
            .finish_non_exhaustive()
    }
}

impl<V> Inner<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn serve_fallback(&self, key: &str) -> V {
        self.metrics.record_fallback();
        self.fallback.fallback(key)
    }

    /// Runs inside the coalesced task
    async fn resolve(self: Arc<Self>, key: String) -> Resolution<V> {
        // A previous resolution may have settled between the caller's cache
        // check and the registry lookup.
        if let Some(value) = self.cache.peek(&key) {
            return Ok(value);
        }
        if let Some(entry) = self.errors.find(&key) {
            return Err(entry.error_class);
        }

        // Counted locally as well, since `invalidate` may wipe the executor's
        // state while this loop runs.
        let mut attempts_made = 0u32;
        let mut last_error = None;
        loop {
            match self.retry.run(&key, FETCH_OPERATION, || self.fetch_once(&key)).await {
                Ok(value) => {
                    self.cache.set(&key, value.clone(), self.config.default_ttl);
                    debug!(key = %key, "fetched and cached");
                    return Ok(value);
                }
                Err(RetryError::AttemptFailed { attempt, max_attempts, source }) => {
                    debug!(key = %key, attempt, max_attempts, error = %source, "fetch attempt failed");
                    attempts_made += 1;
                    let skip_not_found =
                        !self.config.retry_not_found && source.class() == ErrorClass::NotFound;
                    let give_up = attempts_made >= self.config.max_attempts || skip_not_found;
                    last_error = Some(source);
                    if give_up {
                        break;
                    }
                }
                Err(RetryError::AttemptsExhausted { .. }) => break,
            }
        }

        self.retry.reset(&key, FETCH_OPERATION);

        let error = last_error.unwrap_or_else(|| FetchError::other("retry budget already spent"));
        let class = error.class();
        let ttl = self.config.error_ttl(class);
        self.errors.set(&key, class, error.to_string(), ttl);
        log_cached_failure(&key, class, &error, ttl);
        Err(class)
    }

    /// The resolution task died without a result; cache it as `Unknown`
    /// so later reads do not hit the same failure again
    fn cache_aborted(&self, key: &str, err: &PendingError) {
        if self.errors.get(key, ErrorClass::Unknown).is_some() {
            return;
        }
        let ttl = self.config.error_ttl(ErrorClass::Unknown);
        self.retry.reset(key, FETCH_OPERATION);
        self.errors.set(key, ErrorClass::Unknown, err.to_string(), ttl);
        error!(
            key,
            error = %err,
            ttl_ms = ttl.as_millis() as u64,
            "resolution aborted, caching failure"
        );
    }

    async fn fetch_once(&self, key: &str) -> Result<V, FetchError> {
        self.metrics.record_fetch_attempt();
        let timeout = self.config.fetch_timeout;
        match tokio::time::timeout(timeout, self.fetcher.fetch(key)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }
}

fn log_cached_failure(key: &str, class: ErrorClass, error: &FetchError, ttl: Duration) {
    let ttl_ms = ttl.as_millis() as u64;
    match error.severity() {
        ErrorSeverity::Info => {
            info!(key, %class, error = %error, ttl_ms, "fetch failed, caching failure");
        }
        ErrorSeverity::Warning => {
            warn!(key, %class, error = %error, ttl_ms, "fetch failed, caching failure");
        }
        ErrorSeverity::Error | ErrorSeverity::Critical => {
            error!(key, %class, error = %error, ttl_ms, "fetch failed, caching failure");
        }
    }
}

/// Builder for [`CacheCoordinator`]
pub struct CacheCoordinatorBuilder<V> {
    fetcher: Arc<dyn Fetcher<V>>,
    fallback: Arc<dyn FallbackProvider<V>>,
    clock: Option<Arc<dyn Clock>>,
    config: CoordinatorConfig,
}

impl<V> CacheCoordinatorBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Read time from `clock` instead of the system clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and build
    pub fn build(self) -> Result<CacheCoordinator<V>, ConfigError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let inner = Inner {
            cache: CacheStore::new(Arc::clone(&clock)),
            errors: ErrorCache::new(Arc::clone(&clock)),
            retry: RetryExecutor::new(Arc::clone(&clock), self.config.backoff_policy()),
            pending: PendingRequestRegistry::new(),
            metrics: CoordinatorMetrics::default(),
            config: self.config,
            clock,
            fetcher: self.fetcher,
            fallback: self.fallback,
        };
        Ok(CacheCoordinator { inner: Arc::new(inner) })
    }
}
