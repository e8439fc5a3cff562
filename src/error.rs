// src/error.rs

//! Unified error handling for the extraction pipeline.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure of a single network call, before any status interpretation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established or was dropped
    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    /// The request did not complete within the configured timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The response could not be read as text
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Malformed(err.to_string())
        } else {
            TransportError::Unreachable(err.to_string())
        }
    }
}

/// Coarse classification used by retry and fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AuthInvalid,
    RateLimited,
    MalformedPayload,
    Exhausted,
    Rejected,
    Upstream,
    Transport,
    Cancelled,
    Config,
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The named entity does not exist upstream
    #[error("not found: {0}")]
    NotFound(String),

    /// The session cookies are no longer accepted
    #[error("session rejected by upstream: {0}")]
    AuthInvalid(String),

    /// Upstream throttled the request
    #[error("rate limited on {endpoint}{}", retry_hint(.retry_after))]
    RateLimited {
        endpoint: String,
        retry_after: Option<Duration>,
    },

    /// A required field was missing or the payload could not be parsed
    #[error("malformed payload from {context}: {message}")]
    MalformedPayload { context: String, message: String },

    /// Every source failed or the attempt cap was reached
    #[error("{operation} exhausted{}", last_cause(.last))]
    Exhausted {
        operation: String,
        last: Option<Box<AppError>>,
    },

    /// Upstream answered with a client error or an explicit failure payload
    #[error("{endpoint} rejected the request (status {status}): {message}")]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// Upstream answered with a server error
    #[error("{endpoint} failed with status {status}")]
    Upstream { endpoint: String, status: u16 },

    /// A page after the first failed while walking a cursor series
    #[error("page {page} failed after {collected} entities were collected: {source}")]
    PageFailed {
        page: usize,
        collected: usize,
        source: Box<AppError>,
    },

    /// Network-level failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed outside of payload normalization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(wait) => format!(" (retry after {}s)", wait.as_secs()),
        None => String::new(),
    }
}

fn last_cause(last: &Option<Box<AppError>>) -> String {
    match last {
        Some(err) => format!(": {err}"),
        None => String::new(),
    }
}

impl AppError {
    /// Create a malformed payload error.
    pub fn malformed(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::MalformedPayload {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an exhaustion error for an operation.
    pub fn exhausted(operation: impl Into<String>, last: Option<AppError>) -> Self {
        Self::Exhausted {
            operation: operation.into(),
            last: last.map(Box::new),
        }
    }

    /// Taxonomy bucket of this error. Page failures report their cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::AuthInvalid(_) => ErrorKind::AuthInvalid,
            AppError::RateLimited { .. } => ErrorKind::RateLimited,
            AppError::MalformedPayload { .. } | AppError::Json(_) => ErrorKind::MalformedPayload,
            AppError::Exhausted { .. } => ErrorKind::Exhausted,
            AppError::Rejected { .. } => ErrorKind::Rejected,
            AppError::Upstream { .. } => ErrorKind::Upstream,
            AppError::PageFailed { source, .. } => source.kind(),
            AppError::Transport(TransportError::Cancelled) => ErrorKind::Cancelled,
            AppError::Transport(_) => ErrorKind::Transport,
            AppError::Io(_)
            | AppError::Toml(_)
            | AppError::Url(_)
            | AppError::Http(_)
            | AppError::Config(_)
            | AppError::Validation(_) => ErrorKind::Config,
        }
    }

    /// Whether this error ends a fallback chain instead of moving on to the
    /// next source.
    ///
    /// Dead sessions, throttling and cancellation apply to the whole upstream.
    /// A `NotFound` from one endpoint does not stop the chain; the chain
    /// reports it once every source agrees.
    pub fn stops_fallback(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AuthInvalid
                | ErrorKind::RateLimited
                | ErrorKind::Cancelled
                | ErrorKind::Config
        )
    }

    /// Retry-after hint carried by a rate-limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AppError::RateLimited { retry_after, .. } => *retry_after,
            AppError::PageFailed { source, .. } => source.retry_after(),
            _ => None,
        }
    }
}
