//! Configuration loading and management
//!
//! [`Settings`] is everything needed to stand up a profile cache: where the
//! upstream lives and how the cache in front of it behaves. It is loaded
//! from environment variables or a TOML/JSON file by [`loader`].

pub mod loader;

use std::time::Duration;

use profilecache_common::duration_millis;
use profilecache_core::CoordinatorConfig;
use profilecache_domain::{ProfileCacheError, Result};
use serde::{Deserialize, Serialize};

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, load_from_lookup, probe_config_paths};

/// Default `User-Agent` sent to the upstream
pub const DEFAULT_USER_AGENT: &str = concat!("profilecache/", env!("CARGO_PKG_VERSION"));

/// Upstream connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Profiles are fetched from `{base_url}/{key}`
    pub base_url: String,

    /// Per-request timeout enforced by the HTTP client
    #[serde(default = "default_http_timeout", with = "duration_millis")]
    pub timeout: Duration,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl HttpSettings {
    /// Settings for `base_url` with default timeout and user agent
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub http: HttpSettings,

    #[serde(default)]
    pub cache: CoordinatorConfig,
}

impl Settings {
    /// Check both sections
    ///
    /// # Errors
    /// Returns `ProfileCacheError::Config` if the base URL does not parse as
    /// an absolute `http(s)` URL, the HTTP timeout is zero, or the cache
    /// configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.http.base_url).map_err(|e| {
            ProfileCacheError::Config(format!("Invalid base_url '{}': {e}", self.http.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProfileCacheError::Config(format!(
                "Unsupported base_url scheme: {}",
                url.scheme()
            )));
        }
        if self.http.timeout.is_zero() {
            return Err(ProfileCacheError::Config("http.timeout must be greater than zero".into()));
        }
        self.cache.validate()?;
        Ok(())
    }
}
