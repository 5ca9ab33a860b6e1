//! # ProfileCache Domain
//!
//! Domain types for the profile cache.
//!
//! This crate contains:
//! - The [`Profile`] value served to consumers
//! - The top-level [`ProfileCacheError`] and [`Result`] alias
//!
//! ## Architecture
//! - No dependencies on other profilecache crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod errors;
pub mod types;

pub use errors::*;
pub use types::*;
