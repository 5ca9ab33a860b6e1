//! Tracing subscriber setup
//!
//! The core crate only emits `tracing` events; a binary embedding the cache
//! calls [`init_tracing`] once at startup to route them somewhere.

use std::fmt;
use std::str::FromStr;

use profilecache_domain::{ProfileCacheError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "warn,profilecache_core=info,profilecache_infra=info";

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for terminals
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ProfileCacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ProfileCacheError::Config(format!("Unknown log format: {other}"))),
        }
    }
}

/// Filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global tracing subscriber
///
/// # Errors
/// Returns `ProfileCacheError::Internal` if a global subscriber is already
/// installed.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter());

    let installed = match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
    };
    installed
        .map_err(|e| ProfileCacheError::Internal(format!("Failed to init subscriber: {e}")))?;

    tracing::debug!(%format, "Tracing initialized");
    Ok(())
}
