//! Canonical comment and the informational placeholder.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Author handle reserved for synthetic comments.
pub const SYSTEM_AUTHOR: &str = "system_info";

/// Upper bound on comment text, in grapheme clusters.
pub const MAX_COMMENT_LEN: usize = 2200;

const SYSTEM_AVATAR: &str = "https://instagram.com/favicon.ico";
const PLACEHOLDER_TEXT: &str =
    "This post has no comments yet, or its comments are hidden or restricted.";

/// A comment on a media post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Local>,
    pub author: String,
    pub author_avatar_url: String,
}

impl Comment {
    pub fn new(
        id: impl Into<String>,
        text: &str,
        created_at: DateTime<Local>,
        author: impl Into<String>,
        author_avatar_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: bound_text(text),
            created_at,
            author: author.into(),
            author_avatar_url: author_avatar_url.into(),
        }
    }

    /// Synthetic entry returned when a post yields no real comments.
    pub fn placeholder() -> Self {
        let now = Local::now();
        let stamp = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp());
        Self::new(
            format!("info_{stamp}"),
            PLACEHOLDER_TEXT,
            now,
            SYSTEM_AUTHOR,
            SYSTEM_AVATAR,
        )
    }

    pub fn is_placeholder(&self) -> bool {
        self.author == SYSTEM_AUTHOR
    }
}

fn bound_text(text: &str) -> String {
    match text.grapheme_indices(true).nth(MAX_COMMENT_LEN) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_text_is_bounded_on_grapheme_boundaries() {
        let long = "👍🏽".repeat(MAX_COMMENT_LEN + 10);
        let comment = Comment::new("1", &long, Local::now(), "a", "");
        assert_eq!(comment.text.graphemes(true).count(), MAX_COMMENT_LEN);
    }

    #[test]
    fn short_text_is_untouched() {
        let comment = Comment::new("1", "nice shot", Local::now(), "a", "");
        assert_eq!(comment.text, "nice shot");
        assert!(!comment.is_placeholder());
    }

    #[test]
    fn placeholder_uses_reserved_author() {
        let placeholder = Comment::placeholder();
        assert!(placeholder.is_placeholder());
        assert_eq!(placeholder.author, SYSTEM_AUTHOR);
        assert!(placeholder.id.starts_with("info_"));
    }
}
