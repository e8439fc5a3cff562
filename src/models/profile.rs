//! Canonical user profile.

use serde::{Deserialize, Serialize};

/// A public user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Numeric user id, as text
    pub id: String,

    /// Login handle
    pub username: String,

    /// Display name
    pub full_name: String,

    pub biography: String,

    /// Standard-resolution avatar
    pub avatar_url: String,

    /// High-resolution avatar, or the standard one when absent
    pub avatar_url_hd: String,

    pub follower_count: u64,
    pub following_count: u64,
    pub post_count: u64,
}

impl Profile {
    /// Public profile page.
    pub fn url(&self) -> String {
        format!("https://www.instagram.com/{}/", self.username)
    }
}
