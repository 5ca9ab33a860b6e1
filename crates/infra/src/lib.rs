//! # ProfileCache Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The HTTP profile fetcher (`reqwest`)
//! - Configuration loading from environment variables and files
//! - Tracing subscriber setup
//! - Wiring that assembles a ready-to-use profile coordinator
//!
//! ## Architecture
//! - Implements traits defined in `profilecache-core`
//! - Contains all "impure" code (network, file and environment access)

pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use bootstrap::{profile_coordinator, profile_coordinator_with_clock};
pub use config::{HttpSettings, Settings};
pub use errors::InfraError;
pub use http::{HttpProfileFetcher, HttpProfileFetcherBuilder};
pub use observability::{init_tracing, LogFormat};
