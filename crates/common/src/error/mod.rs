//! Failure taxonomy shared by fetchers and the cache layer
//!
//! This module defines how upstream failures are described and classified.
//!
//! 1. **`FetchError`**: the error a fetcher returns. It carries enough
//!    information (an HTTP status code, a transport flag, a timeout) to be
//!    classified without string matching.
//!
//! 2. **`ErrorClass`**: the five buckets negative caching works with. Each
//!    class gets its own time-to-live because the conditions behind them
//!    clear on very different schedules.
//!
//! 3. **`ErrorClassification` trait**: retryability and severity, used for
//!    log levels and retry decisions.
//!
//! ## Classification Table
//!
//! | Failure | ErrorClass | Severity |
//! |---------|------------|----------|
//! | HTTP 404 / 410 | `NotFound` | Info |
//! | HTTP 429 | `RateLimited` | Warning |
//! | HTTP 5xx | `ServerError` | Error |
//! | connect / request failure, timeout | `NetworkError` | Warning |
//! | anything else (other 4xx, decode failure) | `Unknown` | Error |
//!
//! ## Examples
//!
//! ```rust
//! use profilecache_common::error::{ErrorClass, FetchError};
//!
//! let err = FetchError::status(429, "slow down");
//! assert_eq!(err.class(), ErrorClass::RateLimited);
//! assert_eq!(ErrorClass::from_status(503), ErrorClass::ServerError);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified failure kinds used as negative-cache buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Resource confirmed absent upstream
    NotFound,
    /// Caller exceeded its quota
    RateLimited,
    /// Upstream 5xx
    ServerError,
    /// Transport failure, no response received
    NetworkError,
    /// Could not be classified
    Unknown,
}

impl ErrorClass {
    /// Every class, in lookup order
    pub const ALL: [ErrorClass; 5] = [
        ErrorClass::NotFound,
        ErrorClass::RateLimited,
        ErrorClass::ServerError,
        ErrorClass::NetworkError,
        ErrorClass::Unknown,
    ];

    /// Map an HTTP status code onto a class
    pub fn from_status(status: u16) -> Self {
        match status {
            404 | 410 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Stable snake_case name, matching the serde representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::NetworkError => "network_error",
            Self::Unknown => "unknown",
        }
    }

    /// Severity used when logging a failure of this class
    pub fn severity(self) -> ErrorSeverity {
        match self {
            Self::NotFound => ErrorSeverity::Info,
            Self::RateLimited | Self::NetworkError => ErrorSeverity::Warning,
            Self::ServerError | Self::Unknown => ErrorSeverity::Error,
        }
    }

    /// Whether the condition is unlikely to clear within seconds
    pub fn is_permanent(self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unrecognised error class name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error class '{0}'")]
pub struct ParseErrorClassError(pub String);

impl FromStr for ErrorClass {
    type Err = ParseErrorClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|class| class.as_str() == normalized)
            .ok_or_else(|| ParseErrorClassError(s.to_string()))
    }
}

/// Error returned by a fetcher
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Upstream answered with a non-success status
    #[error("upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Transport failure before a response was received
    #[error("network error: {0}")]
    Network(String),

    /// No response within the allotted time
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// A response arrived but its body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Create a status error
    pub fn status<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Status { status, message: message.into() }
    }

    /// Create a transport error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    /// Create an unclassified error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }

    /// HTTP status code, if the failure carried one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Negative-cache bucket for this failure
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Status { status, .. } => ErrorClass::from_status(*status),
            Self::Network(_) | Self::Timeout(_) => ErrorClass::NetworkError,
            Self::Decode(_) | Self::Other(_) => ErrorClass::Unknown,
        }
    }
}

impl ErrorClassification for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Decode(_) => false,
            _ => !self.class().is_permanent(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        self.class().severity()
    }
}

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient conditions that may succeed if
    /// attempted again: timeouts, rate limiting, upstream 5xx.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
