// src/pipeline/mod.rs

//! Public operations of the scanner.
//!
//! - `get_profile`: Profile of a handle
//! - `get_posts_by_tag` / `scan_tags`: Posts under one or several tags
//! - `get_posts_by_user`: Posts of a user id
//! - `get_comments`: Comments of a post
//! - `check_session`: Whether upstream still accepts a session

mod comments;
mod posts;
mod profile;
mod session;

pub use session::SessionState;

use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, Cursor, Page, PageRequest, Session};
use crate::services::{Governor, HttpTransport, Request, Source, SourceChain, Transport, classify};
use crate::utils::text::preview;
use crate::utils::url::{api_url, site_url};

/// Entry point for all extraction operations.
///
/// Holds no per-operation state: every call builds its own governor, so
/// independent operations may run concurrently on one scanner.
pub struct Scanner<T = HttpTransport> {
    config: Arc<Config>,
    transport: T,
    cancel: CancellationToken,
}

impl Scanner<HttpTransport> {
    /// Create a scanner talking to the configured upstream over HTTP.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.api)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> Scanner<T> {
    pub fn with_transport(config: Config, transport: T) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight requests and pending backoff sleeps once `cancel`
    /// fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn governor(&self) -> Governor {
        Governor::new(self.config.retry.clone(), self.cancel.clone())
    }

    fn site(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        site_url(&self.config.api, path, query)
    }

    fn api(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        api_url(&self.config.api, path, query)
    }

    fn page_size(&self, request: &PageRequest) -> usize {
        request.page_size.unwrap_or(self.config.scan.page_size).max(1)
    }

    /// One classified network call.
    async fn fetch(&self, request: Request, session: &Session) -> Result<String> {
        let label = request.label();
        log::debug!("GET {}", request.url);

        let response = self.transport.execute(&request, session).await?;
        log::info!(
            "[{label}] status {} in {} ms",
            response.status,
            response.latency.as_millis()
        );

        let body = classify(&response, &label)?;
        log::debug!("[{label}] {}", preview(&body, 100));
        Ok(body)
    }

    /// Source fetching `request` and parsing the body with `parse`.
    fn source<'a, X, P>(
        &'a self,
        id: &'static str,
        request: Request,
        session: &'a Session,
        parse: P,
    ) -> Source<'a, X>
    where
        P: Fn(&str) -> Result<X> + Send + Sync + 'a,
    {
        Source::new(
            id,
            move || self.fetch(request.clone(), session).boxed(),
            parse,
        )
    }
}

/// Serve one page from a chain, stamping the winning source on its cursor.
async fn serve_page<X>(
    chain: Result<SourceChain<'_, Page<X>>>,
    governor: &Governor,
) -> Result<Page<X>> {
    let hit = chain?.run(governor).await?;
    Ok(hit.value.from_source(hit.source))
}

/// Characters that would change the meaning of a URL path segment.
const RESERVED: &[char] = &['/', '\\', '?', '&', '#', '%'];

/// Trim user input and drop a leading `@` or `#`.
///
/// The result is spliced into URL paths, so it must be a single plain
/// segment.
fn required_input(value: &str, what: &str) -> Result<String> {
    let value = value.trim().trim_start_matches(['@', '#']).trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{what} must not be empty")));
    }
    if value.contains(RESERVED)
        || value.contains(char::is_whitespace)
        || value.chars().all(|c| c == '.')
    {
        return Err(AppError::validation(format!(
            "{what} '{value}' contains reserved characters"
        )));
    }
    Ok(value.to_string())
}

/// Cursor token to send upstream, if any.
fn cursor_token(cursor: Option<&Cursor>) -> Option<&str> {
    cursor.map(|c| c.token.as_str()).filter(|token| !token.is_empty())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::models::RetryConfig;
    use crate::services::transport::testing::ScriptedTransport;

    pub(crate) fn scanner(transport: ScriptedTransport) -> Scanner<ScriptedTransport> {
        let config = Config {
            retry: RetryConfig::immediate(2),
            ..Config::default()
        };
        Scanner::with_transport(config, transport)
    }

    pub(crate) fn session() -> Session {
        Session::new([("sessionid", "abc"), ("csrftoken", "tok")])
    }
}
