//! Common building blocks shared across the profile cache crates.
//!
//! - [`time`]: the [`Clock`](time::Clock) abstraction with real and mock
//!   implementations
//! - [`error`]: fetch failure taxonomy and classification
//! - [`utils`]: serde helpers for duration-valued configuration

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod time;
pub mod utils;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use error::{ErrorClass, ErrorClassification, ErrorSeverity, FetchError};
pub use time::{Clock, MockClock, SystemClock};
pub use utils::serde::{duration_map_millis, duration_millis};
