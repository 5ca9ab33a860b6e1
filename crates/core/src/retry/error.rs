//! Retry error types

use thiserror::Error;

/// Errors returned by [`RetryExecutor::run`](super::RetryExecutor::run)
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The budget for this key and operation is spent; nothing was attempted
    #[error("All retry attempts exhausted after {attempts} tries")]
    AttemptsExhausted { attempts: u32 },

    /// The attempt ran and failed
    #[error("Attempt {attempt} of {max_attempts} failed: {source}")]
    AttemptFailed { attempt: u32, max_attempts: u32, source: E },
}

impl<E> RetryError<E> {
    /// Whether no further attempt will be allowed
    pub fn is_exhausted(&self) -> bool {
        match self {
            Self::AttemptsExhausted { .. } => true,
            Self::AttemptFailed { attempt, max_attempts, .. } => attempt >= max_attempts,
        }
    }

    /// The operation's error, if an attempt ran
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::AttemptsExhausted { .. } => None,
            Self::AttemptFailed { source, .. } => Some(source),
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;
