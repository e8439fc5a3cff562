// src/services/paginate.rs

//! Cursor walker.
//!
//! Follows continuation cursors until upstream runs out or the page budget
//! is spent, accumulating entities in order.

use std::future::Future;

use crate::error::{AppError, Result};
use crate::models::{Cursor, Page};

/// A walk that stopped on a failed page, with everything collected before it.
#[derive(Debug)]
pub struct WalkError<T> {
    /// 1-based number of the page that failed
    pub page: usize,
    pub partial: Vec<T>,
    pub error: AppError,
}

impl<T> WalkError<T> {
    /// Collapse into an [`AppError`], dropping the partial items.
    ///
    /// A failure on the first page is the underlying error itself.
    pub fn into_error(self) -> AppError {
        if self.page <= 1 {
            self.error
        } else {
            AppError::PageFailed {
                page: self.page,
                collected: self.partial.len(),
                source: Box::new(self.error),
            }
        }
    }
}

/// Walk pages starting at `start`, calling `fetch` with the cursor of each.
///
/// `budget` caps the number of pages; `Some(0)` still fetches one page. A
/// cursor that repeats its predecessor ends the walk. The returned page holds
/// every entity in arrival order; its `next` cursor is where a walk stopped by
/// the budget can resume, and the end cursor otherwise.
pub async fn walk<T, F, Fut>(
    operation: &str,
    start: Option<Cursor>,
    budget: Option<usize>,
    mut fetch: F,
) -> std::result::Result<Page<T>, WalkError<T>>
where
    F: FnMut(Option<Cursor>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let budget = budget.map(|pages| pages.max(1));
    let mut items = Vec::new();
    let mut cursor = start;
    let mut page = 0;
    let mut resume = Cursor::end();

    loop {
        page += 1;
        let previous = cursor.as_ref().map(|c| c.token.clone());

        let Page { items: batch, next } = match fetch(cursor.take()).await {
            Ok(result) => result,
            Err(error) => {
                return Err(WalkError {
                    page,
                    partial: items,
                    error,
                });
            }
        };
        log::debug!("[{operation}] page {page}: {} items", batch.len());
        items.extend(batch);

        if !next.has_next() {
            break;
        }
        if budget.is_some_and(|pages| page >= pages) {
            log::debug!("[{operation}] page budget of {page} reached");
            resume = next;
            break;
        }
        if previous.as_deref() == Some(next.token.as_str()) {
            log::warn!("[{operation}] cursor repeated on page {page}, stopping");
            break;
        }
        cursor = Some(next);
    }

    log::info!("[{operation}] collected {} items over {page} pages", items.len());
    Ok(Page::new(items, resume))
}

/// [`walk`] reporting failures as [`AppError`].
///
/// A walk cut short by the budget logs the token to pass back as the start
/// cursor of a later call.
pub async fn collect<T, F, Fut>(
    operation: &str,
    start: Option<Cursor>,
    budget: Option<usize>,
    fetch: F,
) -> Result<Vec<T>>
where
    F: FnMut(Option<Cursor>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let Page { items, next } = walk(operation, start, budget, fetch)
        .await
        .map_err(WalkError::into_error)?;
    if next.has_next() {
        log::info!(
            "[{operation}] more pages available, resume with cursor {}",
            next.token
        );
    }
    Ok(items)
}
