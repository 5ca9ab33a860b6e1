//! Domain types and models

pub mod profile;

pub use profile::{initials_for, Profile, PLACEHOLDER_COLORS};
