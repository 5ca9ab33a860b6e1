//! Coordinator configuration
//!
//! Every TTL, budget and interval the coordinator uses lives here. The type
//! deserializes from TOML or JSON with durations written as milliseconds;
//! any field left out takes its default.

use std::collections::HashMap;
use std::time::Duration;

use profilecache_common::{duration_map_millis, duration_millis, ErrorClass};
use profilecache_domain::ProfileCacheError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::BackoffPolicy;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A duration or count that must be positive was zero
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    /// The backoff cap is below the first delay
    #[error("max_backoff ({max_backoff:?}) must not be shorter than base_delay ({base_delay:?})")]
    BackoffRange { base_delay: Duration, max_backoff: Duration },

    /// A fallback provider was given nothing to serve
    #[error("fallback pool must not be empty")]
    EmptyFallbackPool,
}

impl From<ConfigError> for ProfileCacheError {
    fn from(err: ConfigError) -> Self {
        ProfileCacheError::Config(err.to_string())
    }
}

/// Built-in negative-cache TTL for a class
pub fn default_error_ttl(class: ErrorClass) -> Duration {
    match class {
        ErrorClass::NotFound => Duration::from_secs(5 * 60),
        ErrorClass::RateLimited => Duration::from_secs(30),
        ErrorClass::ServerError => Duration::from_secs(2 * 60),
        ErrorClass::NetworkError => Duration::from_secs(30),
        ErrorClass::Unknown => Duration::from_secs(60),
    }
}

/// Settings for [`CacheCoordinator`](super::CacheCoordinator)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Lifetime of a successfully fetched value
    #[serde(with = "duration_millis")]
    pub default_ttl: Duration,

    /// Negative-cache lifetime per class; missing classes use
    /// [`default_error_ttl`]
    #[serde(with = "duration_map_millis")]
    pub error_ttl_by_class: HashMap<ErrorClass, Duration>,

    /// Fetch attempts per resolution
    pub max_attempts: u32,

    /// Wait after the first failed attempt
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,

    /// Cap on the wait between attempts
    #[serde(with = "duration_millis")]
    pub max_backoff: Duration,

    /// Period of the background janitor
    #[serde(with = "duration_millis")]
    pub sweep_interval: Duration,

    /// Retry state untouched for longer than this is dropped by a sweep
    #[serde(with = "duration_millis")]
    pub retry_state_idle: Duration,

    /// Bound on a single fetch attempt
    #[serde(with = "duration_millis")]
    pub fetch_timeout: Duration,

    /// Whether `NotFound` failures use the full attempt budget
    pub retry_not_found: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(5 * 60),
            error_ttl_by_class: ErrorClass::ALL
                .into_iter()
                .map(|class| (class, default_error_ttl(class)))
                .collect(),
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(5 * 60),
            retry_state_idle: Duration::from_secs(60 * 60),
            fetch_timeout: Duration::from_secs(10),
            retry_not_found: true,
        }
    }
}

impl CoordinatorConfig {
    /// Create a configuration builder
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::new()
    }

    /// Negative-cache TTL for `class`
    pub fn error_ttl(&self, class: ErrorClass) -> Duration {
        self.error_ttl_by_class.get(&class).copied().unwrap_or_else(|| default_error_ttl(class))
    }

    /// Backoff settings handed to the retry executor
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_backoff: self.max_backoff,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("default_ttl", self.default_ttl),
            ("base_delay", self.base_delay),
            ("sweep_interval", self.sweep_interval),
            ("retry_state_idle", self.retry_state_idle),
            ("fetch_timeout", self.fetch_timeout),
        ];
        if let Some((field, _)) = positive.into_iter().find(|(_, value)| value.is_zero()) {
            return Err(ConfigError::Zero { field });
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::Zero { field: "max_attempts" });
        }

        if self.max_backoff < self.base_delay {
            return Err(ConfigError::BackoffRange {
                base_delay: self.base_delay,
                max_backoff: self.max_backoff,
            });
        }

        Ok(())
    }
}

/// Builder for CoordinatorConfig with fluent API
#[derive(Debug, Default)]
pub struct CoordinatorConfigBuilder {
    config: CoordinatorConfig,
}

impl CoordinatorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    pub fn error_ttl(mut self, class: ErrorClass, ttl: Duration) -> Self {
        self.config.error_ttl_by_class.insert(class, ttl);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    pub fn max_backoff(mut self, delay: Duration) -> Self {
        self.config.max_backoff = delay;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn retry_state_idle(mut self, idle: Duration) -> Self {
        self.config.retry_state_idle = idle;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    pub fn retry_not_found(mut self, retry: bool) -> Self {
        self.config.retry_not_found = retry;
        self
    }

    pub fn build(self) -> Result<CoordinatorConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
