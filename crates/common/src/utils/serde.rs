//! Serialization utilities for configuration types
//!
//! Durations in configuration files are written as plain millisecond
//! integers so the same file works in both TOML and JSON.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serde serialization result type
type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

/// Custom serialization module for Duration as milliseconds
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use profilecache_common::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::*;

    /// Serialize a Duration as milliseconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    /// Deserialize milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serialization for `HashMap<K, Duration>` with millisecond values
///
/// Keys are serialized with their own representation (for enum keys this is
/// the variant name), values as `u64` milliseconds. Entries are written in
/// key order so generated files are stable.
///
/// # Usage
/// ```rust
/// use std::collections::HashMap;
/// use std::time::Duration;
///
/// use profilecache_common::duration_map_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_map_millis")]
///     ttl_by_kind: HashMap<String, Duration>,
/// }
/// ```
pub mod duration_map_millis {
    use super::*;

    /// Serialize the map with millisecond values
    pub fn serialize<K, S>(map: &HashMap<K, Duration>, serializer: S) -> SerializeResult<S>
    where
        K: Serialize + Ord,
        S: Serializer,
    {
        let mut entries: Vec<(&K, &Duration)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut out = serializer.serialize_map(Some(entries.len()))?;
        for (key, duration) in entries {
            out.serialize_entry(key, &(duration.as_millis() as u64))?;
        }
        out.end()
    }

    /// Deserialize a map of millisecond values
    pub fn deserialize<'de, K, D>(deserializer: D) -> Result<HashMap<K, Duration>, D::Error>
    where
        K: DeserializeOwned + Eq + Hash,
        D: Deserializer<'de>,
    {
        let raw = HashMap::<K, u64>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|(k, millis)| (k, Duration::from_millis(millis))).collect())
    }
}
