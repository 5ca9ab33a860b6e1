//! Time utilities and abstractions
//!
//! - **[`clock`]**: the [`Clock`] trait with a tokio-backed [`SystemClock`]
//!   and a manually driven [`MockClock`] for tests
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use profilecache_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let before = clock.now();
//! clock.advance(Duration::from_secs(30));
//! assert!(clock.now() > before);
//! ```

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
