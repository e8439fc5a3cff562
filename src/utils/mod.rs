//! Utility functions and helpers.

pub mod http;
pub mod shortcode;
pub mod text;
pub mod time;
pub mod url;
