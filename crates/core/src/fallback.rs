//! Deterministic fallback providers
//!
//! Both providers pick from a fixed pool by hashing the key with blake3, so
//! the choice is stable across calls, processes and platforms.

use profilecache_domain::{Profile, PLACEHOLDER_COLORS};

use crate::coordinator::ConfigError;
use crate::ports::FallbackProvider;

/// Stable index of `key` into a pool of `len` items
///
/// `len` must be non-zero.
fn stable_index(key: &str, len: usize) -> usize {
    let digest = blake3::hash(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) % len as u64) as usize
}

/// Serves one of a fixed set of values, chosen by key
#[derive(Debug, Clone)]
pub struct PooledFallback<V> {
    pool: Vec<V>,
}

impl<V: Clone> PooledFallback<V> {
    /// Create a provider over `pool`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyFallbackPool`] if `pool` is empty.
    pub fn new(pool: Vec<V>) -> Result<Self, ConfigError> {
        if pool.is_empty() {
            return Err(ConfigError::EmptyFallbackPool);
        }
        Ok(Self { pool })
    }

    /// A provider that always serves `value`
    pub fn single(value: V) -> Self {
        Self { pool: vec![value] }
    }
}

impl<V: Clone + Send + Sync> FallbackProvider<V> for PooledFallback<V> {
    fn fallback(&self, key: &str) -> V {
        self.pool[stable_index(key, self.pool.len())].clone()
    }
}

/// Serves placeholder profiles with initials and a colour derived from the key
#[derive(Debug, Clone)]
pub struct ProfileFallback {
    colors: Vec<String>,
}

impl ProfileFallback {
    /// Use a custom colour palette
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyFallbackPool`] if `colors` is empty.
    pub fn with_colors<I, S>(colors: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let colors: Vec<String> = colors.into_iter().map(Into::into).collect();
        if colors.is_empty() {
            return Err(ConfigError::EmptyFallbackPool);
        }
        Ok(Self { colors })
    }
}

impl Default for ProfileFallback {
    fn default() -> Self {
        Self { colors: PLACEHOLDER_COLORS.iter().map(|c| (*c).to_string()).collect() }
    }
}

impl FallbackProvider<Profile> for ProfileFallback {
    fn fallback(&self, key: &str) -> Profile {
        let color = &self.colors[stable_index(key, self.colors.len())];
        Profile::placeholder(key, color)
    }
}
