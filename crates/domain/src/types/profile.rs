//! Profile types
//!
//! A profile is the slowly-changing record the cache layer serves: a display
//! name plus the bits needed to render an avatar. When the upstream cannot
//! deliver one, a placeholder derived from the key is rendered instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Background colours used for placeholder avatars
pub const PLACEHOLDER_COLORS: [&str; 8] = [
    "#1abc9c", "#2ecc71", "#3498db", "#9b59b6", "#e67e22", "#e74c3c", "#34495e", "#7f8c8d",
];

/// Profile as served by the upstream directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub initials: String,
    #[serde(default)]
    pub color: String,
    /// Absent on placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Build a placeholder for `id`
    ///
    /// The display name is the key itself and the initials are taken from
    /// its first two alphanumeric words (or its first two characters when it
    /// is a single word). The result depends only on the arguments.
    pub fn placeholder(id: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: id.to_string(),
            avatar_url: None,
            initials: initials_for(id),
            color: color.to_string(),
            updated_at: None,
        }
    }

    /// Whether this profile was synthesised locally
    pub fn is_placeholder(&self) -> bool {
        self.updated_at.is_none() && self.avatar_url.is_none() && self.display_name == self.id
    }
}

/// Up to two uppercase initials for a name or key
pub fn initials_for(name: &str) -> String {
    let words: Vec<&str> =
        name.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();

    let initials: String = match words.as_slice() {
        [] => return "?".to_string(),
        [single] => single.chars().take(2).collect(),
        [first, second, ..] => first.chars().take(1).chain(second.chars().take(1)).collect(),
    };
    initials.to_uppercase()
}
