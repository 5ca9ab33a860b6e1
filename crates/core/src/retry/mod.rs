//! Per-key exponential backoff
//!
//! The [`RetryExecutor`] makes one attempt per call and remembers failures
//! per `(key, operation)`. A caller that wants to keep going simply calls
//! again: the executor waits out whatever is left of the backoff window
//! first, and refuses once the attempt budget is spent.
//!
//! ## Timeline with the default policy
//!
//! | Attempt | Starts at | Backoff stored after failure |
//! |---------|-----------|------------------------------|
//! | 1 | 0s | 1s |
//! | 2 | 1s | 2s |
//! | 3 | 3s | 4s |
//! | 4 | refused | - |

pub mod error;
pub mod executor;

pub use error::{RetryError, RetryResult};
pub use executor::{BackoffPolicy, RetryExecutor, RetryState};
