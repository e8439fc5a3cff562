// src/lib.rs

//! instascan Library
//!
//! Resilient extraction of public profiles, posts and comments from an
//! upstream whose endpoints and payload shapes drift. Every operation runs
//! an ordered chain of sources under a shared backoff governor and maps
//! whatever payload shape answers onto one canonical model.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;

pub use error::{AppError, ErrorKind, Result};
pub use pipeline::{Scanner, SessionState};
