// src/models/mod.rs

//! Domain models for the scanner.
//!
//! Canonical entities are immutable values produced by normalization and
//! handed to the caller. Nothing here depends on an upstream schema version.

mod comment;
mod config;
mod page;
mod post;
mod profile;
mod session;

// Re-export all public types
pub use comment::{Comment, MAX_COMMENT_LEN, SYSTEM_AUTHOR};
pub use config::{ApiConfig, Config, LoggingConfig, RetryConfig, ScanConfig};
pub use page::{Cursor, Page, PageRequest};
pub use post::{MediaKind, MediaPost};
pub use profile::Profile;
pub use session::{CSRF_COOKIE, Session};
