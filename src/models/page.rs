//! Cursor-based pagination types.

use serde::{Deserialize, Serialize};

/// Continuation token for the next page of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Opaque upstream token, empty when upstream gave none
    pub token: String,

    /// Upstream reports further pages
    pub more_available: bool,

    /// Source that issued the token; continuation pages go back to it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Cursor {
    /// Cursor marking the end of a series.
    pub fn end() -> Self {
        Self::default()
    }

    /// Resume from a caller-held token of unknown origin.
    pub fn resume(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            more_available: true,
            source: None,
        }
    }

    /// Whether a request for the next page makes sense.
    pub fn has_next(&self) -> bool {
        self.more_available && !self.token.is_empty()
    }
}

/// Entities of one page plus the cursor for the following page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Cursor,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: Cursor) -> Self {
        Self { items, next }
    }

    /// A page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, Cursor::end())
    }

    /// Stamp the issuing source onto the continuation cursor.
    pub fn from_source(mut self, source: &str) -> Self {
        self.next.source = Some(source.to_string());
        self
    }
}

/// Caller options for list operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Start from this token instead of the first page
    pub cursor: Option<String>,

    /// Items per page where the endpoint accepts a count
    pub page_size: Option<usize>,

    /// Maximum pages to fetch; `None` walks until upstream runs out
    pub page_budget: Option<usize>,
}

impl PageRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn pages(mut self, page_budget: usize) -> Self {
        self.page_budget = Some(page_budget);
        self
    }

    pub(crate) fn start_cursor(&self) -> Option<Cursor> {
        self.cursor
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(Cursor::resume)
    }
}
