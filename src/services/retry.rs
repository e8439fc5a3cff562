// src/services/retry.rs

//! Backoff governor.
//!
//! Wraps one logical upstream call with randomized pacing, linear backoff
//! and an attempt cap. Logic errors are never retried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, ErrorKind, Result, TransportError};
use crate::models::RetryConfig;

/// What the governor does with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    /// Propagate unchanged
    Surface,
    /// Back off and try again while attempts remain
    Retry,
    /// Back off and try again; re-raise as is on the last attempt
    Throttled,
}

/// Pacing, backoff and cancellation for upstream calls.
#[derive(Debug, Clone)]
pub struct Governor {
    config: RetryConfig,
    cancel: CancellationToken,
}

impl Governor {
    pub fn new(config: RetryConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay after a failed attempt `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.config.base_delay().saturating_mul(attempt)
    }

    /// Uniformly random delay in `[min_pacing, max_pacing]`.
    pub(crate) fn pacing_delay(&self) -> Duration {
        let min = self.config.min_pacing_ms;
        let max = self.config.max_pacing_ms.max(min);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn verdict(&self, err: &AppError) -> Verdict {
        match err.kind() {
            ErrorKind::RateLimited => Verdict::Throttled,
            ErrorKind::Upstream | ErrorKind::Transport => Verdict::Retry,
            ErrorKind::MalformedPayload if self.config.retry_malformed => Verdict::Retry,
            _ => Verdict::Surface,
        }
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// Every attempt is preceded by a pacing delay. After a transient failure
    /// the governor waits `attempt * base_delay` before the next attempt. When
    /// the cap is reached the error is `Exhausted` naming `operation` and the
    /// last cause, except for throttling, which surfaces as `RateLimited`.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last = None;

        for attempt in 1..=max_attempts {
            self.pause(self.pacing_delay()).await?;

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(AppError::from(TransportError::Cancelled)),
                result = op() => result,
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        log::debug!("[{operation}] succeeded on attempt {attempt}");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let remaining = attempt < max_attempts;
            match self.verdict(&err) {
                Verdict::Surface => return Err(err),
                Verdict::Throttled if !remaining => {
                    log::warn!("[{operation}] still rate limited after {attempt} attempts");
                    return Err(err);
                }
                Verdict::Throttled => {
                    let delay = err
                        .retry_after()
                        .unwrap_or_default()
                        .max(self.backoff_delay(attempt));
                    log::warn!(
                        "[{operation}] rate limited, waiting {} ms (attempt {attempt}/{max_attempts})",
                        delay.as_millis()
                    );
                    self.pause(delay).await?;
                }
                Verdict::Retry if remaining => {
                    let delay = self.backoff_delay(attempt);
                    log::warn!(
                        "[{operation}] attempt {attempt}/{max_attempts} failed: {err}; retrying in {} ms",
                        delay.as_millis()
                    );
                    self.pause(delay).await?;
                }
                Verdict::Retry => {
                    log::warn!("[{operation}] attempt {attempt}/{max_attempts} failed: {err}");
                }
            }
            last = Some(err);
        }

        Err(AppError::exhausted(operation, last))
    }

    /// Sleep unless cancelled first.
    async fn pause(&self, delay: Duration) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Cancelled.into());
        }
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransportError::Cancelled.into()),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
