//! Canonical media post.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Public permalink prefix for posts.
const POST_URL_PREFIX: &str = "https://www.instagram.com/p/";

/// Kind of media attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_is_video(is_video: bool) -> Self {
        if is_video {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// A single media post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPost {
    pub id: String,

    /// Short code used in the public URL
    pub shortcode: String,

    /// Caption text, empty when the post has none
    pub caption: String,

    pub kind: MediaKind,

    /// Primary image URL
    pub image_url: String,

    /// Dedicated thumbnail, or the primary image when absent
    pub thumbnail_url: String,

    pub comment_count: u64,
    pub like_count: u64,

    /// Creation time in local time
    pub taken_at: DateTime<Local>,

    /// Canonical permalink, derived from `shortcode`
    pub url: String,
}

impl MediaPost {
    /// Permalink for a short code.
    pub fn url_for(shortcode: &str) -> String {
        format!("{POST_URL_PREFIX}{shortcode}")
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_a_function_of_shortcode() {
        assert_eq!(
            MediaPost::url_for("CxYz_12-ab"),
            "https://www.instagram.com/p/CxYz_12-ab"
        );
        assert_eq!(MediaPost::url_for("abc"), MediaPost::url_for("abc"));
    }
}
