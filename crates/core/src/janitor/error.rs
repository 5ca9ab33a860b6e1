//! Janitor error types

use std::time::Duration;

use profilecache_domain::ProfileCacheError;
use thiserror::Error;
use tokio::task::JoinError;

/// Janitor lifecycle errors
#[derive(Debug, Error)]
pub enum JanitorError {
    /// Janitor is already running
    #[error("Janitor already running")]
    AlreadyRunning,

    /// Janitor is not running
    #[error("Janitor not running")]
    NotRunning,

    /// The background task did not stop in time
    #[error("Janitor did not stop within {duration:?}")]
    Timeout { duration: Duration },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(#[from] JoinError),
}

impl From<JanitorError> for ProfileCacheError {
    fn from(err: JanitorError) -> Self {
        match err {
            JanitorError::AlreadyRunning | JanitorError::NotRunning => {
                ProfileCacheError::InvalidInput(err.to_string())
            }
            JanitorError::Timeout { .. } | JanitorError::TaskJoinFailed(_) => {
                ProfileCacheError::Internal(err.to_string())
            }
        }
    }
}

/// Convenience type alias for janitor operations
pub type JanitorResult<T> = Result<T, JanitorError>;
