// src/services/fallback.rs

//! Ordered source chains.
//!
//! Each logical operation is served by an ordered list of sources (private
//! API endpoints first, rendered HTML last). The chain tries them in order
//! and returns the first non-empty result.

use futures::future::BoxFuture;

use crate::error::{AppError, ErrorKind, Result};
use crate::models::{Cursor, Page, Profile};
use crate::services::retry::Governor;

pub type FetchFn<'a> = Box<dyn Fn() -> BoxFuture<'a, Result<String>> + Send + Sync + 'a>;
pub type ParseFn<'a, T> = Box<dyn Fn(&str) -> Result<T> + Send + Sync + 'a>;

/// Whether a successful parse produced anything worth returning.
pub trait Yield {
    fn is_empty_yield(&self) -> bool;
}

impl<T> Yield for Page<T> {
    fn is_empty_yield(&self) -> bool {
        self.items.is_empty()
    }
}

impl Yield for Profile {
    fn is_empty_yield(&self) -> bool {
        false
    }
}

/// One way of obtaining a result: a fetch and a parse of its body.
pub struct Source<'a, T> {
    id: &'static str,
    fetch: FetchFn<'a>,
    parse: ParseFn<'a, T>,
}

impl<'a, T> Source<'a, T> {
    pub fn new<F, P>(id: &'static str, fetch: F, parse: P) -> Self
    where
        F: Fn() -> BoxFuture<'a, Result<String>> + Send + Sync + 'a,
        P: Fn(&str) -> Result<T> + Send + Sync + 'a,
    {
        Self {
            id,
            fetch: Box::new(fetch),
            parse: Box::new(parse),
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }
}

/// Result of a chain together with the source that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit<T> {
    pub source: &'static str,
    pub value: T,
}

/// Ordered sources for one logical operation.
pub struct SourceChain<'a, T> {
    operation: String,
    sources: Vec<Source<'a, T>>,
}

impl<'a, T: Yield> SourceChain<'a, T> {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            sources: Vec::new(),
        }
    }

    /// Append a source at the lowest priority so far.
    pub fn then(mut self, source: Source<'a, T>) -> Self {
        self.sources.push(source);
        self
    }

    /// Keep only the source that issued `cursor`.
    ///
    /// Tokens are only meaningful to the endpoint that produced them. A
    /// cursor of unknown origin keeps the whole chain.
    pub fn restrict_to(mut self, cursor: Option<&Cursor>) -> Self {
        let Some(origin) = cursor.and_then(|c| c.source.as_deref()) else {
            return self;
        };
        if self.sources.iter().any(|s| s.id == origin) {
            self.sources.retain(|s| s.id == origin);
        } else {
            log::debug!(
                "[{}] cursor from unknown source '{origin}', keeping full chain",
                self.operation
            );
        }
        self
    }

    pub fn source_ids(&self) -> Vec<&'static str> {
        self.sources.iter().map(Source::id).collect()
    }

    /// Try sources in order through `governor`.
    ///
    /// An error or an empty yield moves on to the next source, except for
    /// errors that apply to the whole upstream ([`AppError::stops_fallback`]),
    /// which end the chain at once. If every source answered `NotFound` that
    /// error is returned; otherwise running out of sources is `Exhausted`.
    pub async fn run(&self, governor: &Governor) -> Result<Hit<T>> {
        let mut last = None;
        let mut all_not_found = !self.sources.is_empty();

        for source in &self.sources {
            let outcome = governor
                .execute(source.id, || async move {
                    let body = (source.fetch)().await?;
                    (source.parse)(&body)
                })
                .await;

            match outcome {
                Ok(value) if value.is_empty_yield() => {
                    log::info!("[{}] {} returned nothing", self.operation, source.id);
                    all_not_found = false;
                }
                Ok(value) => {
                    log::info!("[{}] served by {}", self.operation, source.id);
                    return Ok(Hit {
                        source: source.id,
                        value,
                    });
                }
                Err(err) if err.stops_fallback() => return Err(err),
                Err(err) => {
                    log::warn!("[{}] {} failed: {err}", self.operation, source.id);
                    all_not_found &= err.kind() == ErrorKind::NotFound;
                    last = Some(err);
                }
            }
        }

        match last {
            Some(err) if all_not_found => Err(err),
            last => Err(AppError::exhausted(&self.operation, last)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::models::RetryConfig;

    fn governor() -> Governor {
        Governor::new(RetryConfig::immediate(2), CancellationToken::new())
    }

    /// Source answering with a fixed body and counting its calls.
    fn counted<'a>(
        id: &'static str,
        body: Result<&'static str>,
        calls: &'a AtomicUsize,
    ) -> Source<'a, Page<String>> {
        let body = body.map(str::to_string);
        Source::new(
            id,
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                let body = match &body {
                    Ok(text) => Ok(text.clone()),
                    Err(err) => Err(clone_error(err)),
                };
                async move { body }.boxed()
            },
            |body| {
                let items = body
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                Ok(Page::last(items))
            },
        )
    }

    fn clone_error(err: &AppError) -> AppError {
        match err {
            AppError::NotFound(what) => AppError::NotFound(what.clone()),
            AppError::AuthInvalid(why) => AppError::AuthInvalid(why.clone()),
            AppError::Rejected {
                endpoint,
                status,
                message,
            } => AppError::Rejected {
                endpoint: endpoint.clone(),
                status: *status,
                message: message.clone(),
            },
            _ => AppError::Upstream {
                endpoint: "test".into(),
                status: 500,
            },
        }
    }

    fn rejected() -> AppError {
        AppError::Rejected {
            endpoint: "a".into(),
            status: 403,
            message: "nope".into(),
        }
    }

    #[tokio::test]
    async fn later_sources_are_not_called_after_a_hit() {
        let (a, b, c) = (AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0));
        let chain = SourceChain::new("op")
            .then(counted("a", Err(rejected()), &a))
            .then(counted("b", Ok("x,y,z"), &b))
            .then(counted("c", Ok("w"), &c));

        let hit = chain.run(&governor()).await.unwrap();
        assert_eq!(hit.source, "b");
        assert_eq!(hit.value.items.len(), 3);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(c.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_yield_moves_on() {
        let (a, b) = (AtomicUsize::new(0), AtomicUsize::new(0));
        let chain = SourceChain::new("op")
            .then(counted("a", Ok(""), &a))
            .then(counted("b", Ok("x"), &b));
        let hit = chain.run(&governor()).await.unwrap();
        assert_eq!(hit.source, "b");
    }

    #[tokio::test]
    async fn dead_session_ends_the_chain() {
        let (a, b) = (AtomicUsize::new(0), AtomicUsize::new(0));
        let chain = SourceChain::new("op")
            .then(counted("a", Err(AppError::AuthInvalid("expired".into())), &a))
            .then(counted("b", Ok("x"), &b));
        let err = chain.run(&governor()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthInvalid);
        assert_eq!(b.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhaustion_names_operation_and_last_cause() {
        let (a, b) = (AtomicUsize::new(0), AtomicUsize::new(0));
        let chain = SourceChain::new("get_posts_by_tag(#rust)")
            .then(counted("a", Ok(""), &a))
            .then(counted("b", Err(rejected()), &b));
        match chain.run(&governor()).await.unwrap_err() {
            AppError::Exhausted { operation, last } => {
                assert_eq!(operation, "get_posts_by_tag(#rust)");
                assert_eq!(last.unwrap().kind(), ErrorKind::Rejected);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unanimous_not_found_is_reported_as_such() {
        let (a, b) = (AtomicUsize::new(0), AtomicUsize::new(0));
        let chain = SourceChain::new("get_profile(ghost)")
            .then(counted("a", Err(AppError::NotFound("ghost".into())), &a))
            .then(counted("b", Err(AppError::NotFound("ghost".into())), &b));
        let err = chain.run(&governor()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cursor_restricts_chain_to_its_source() {
        let (a, b) = (AtomicUsize::new(0), AtomicUsize::new(0));
        let chain = || {
            SourceChain::new("op")
                .then(counted("a", Ok("x"), &a))
                .then(counted("b", Ok("y"), &b))
        };
        let from_b = Cursor {
            token: "t".into(),
            more_available: true,
            source: Some("b".into()),
        };
        assert_eq!(chain().restrict_to(Some(&from_b)).source_ids(), vec!["b"]);
        assert_eq!(
            chain().restrict_to(Some(&Cursor::resume("t"))).source_ids(),
            vec!["a", "b"]
        );
        assert_eq!(chain().restrict_to(None).source_ids(), vec!["a", "b"]);
    }
}
