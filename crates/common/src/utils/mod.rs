//! Common utility functions
//!
//! - **[`serde`]**: Serialization helpers for configuration types

pub mod serde;

// Re-export commonly used items for convenience
pub use self::serde::{duration_map_millis, duration_millis};
