//! Bounded retry execution for fallible driver operations.
//!
//! Retry is an explicit higher-order call rather than a decorator:
//! [`RetryExecutor::execute`] takes a closure producing the operation future
//! and a name for logging, and drives it under the engine's single
//! [`RetryPolicy`]. Only failures whose classification the policy marks
//! retryable are attempted again; everything else propagates on first
//! occurrence with the attempt count attached.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tokio::time::sleep;

use crate::driver::{DriverError, FailureKind};
use crate::logging::TestLogger;

/// How many attempts an operation gets, the delay schedule between them, and
/// which failure classifications are worth another try.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    backoff_factor: Option<f64>,
    max_delay: Duration,
    retryable: Vec<FailureKind>,
}

impl RetryPolicy {
    /// A fixed-delay policy retrying the transient classifications
    /// (not-found, stale, intercepted). At least one attempt is always made.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff_factor: None,
            max_delay: delay,
            retryable: vec![
                FailureKind::NotFound,
                FailureKind::Stale,
                FailureKind::Intercepted,
            ],
        }
    }

    /// Multiply the delay by `factor` after each attempt, capped at
    /// `max_delay` so total wait stays bounded.
    pub fn with_backoff(mut self, factor: f64, max_delay: Duration) -> Self {
        self.backoff_factor = Some(factor);
        self.max_delay = max_delay;
        self
    }

    /// Replace the retryable classification set. Session death is never
    /// retried regardless of this set.
    pub fn with_retryable(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.retryable = kinds.into_iter().collect();
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_retryable(&self, kind: FailureKind) -> bool {
        kind != FailureKind::SessionDead && self.retryable.contains(&kind)
    }

    /// Delay to wait after the given 1-based attempt fails.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff_factor {
            None => self.delay,
            Some(factor) => {
                let scaled = self
                    .delay
                    .mul_f64(factor.powi(attempt.saturating_sub(1) as i32));
                scaled.min(self.max_delay)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_secs(1)).with_backoff(2.0, Duration::from_secs(8))
    }
}

/// Terminal outcome of an exhausted or non-retryable operation. The last
/// failure is carried unchanged; diagnostic capture is the caller's job and
/// happens once per terminal failure, never once per attempt.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempt(s)")]
pub struct RetryFailure {
    pub operation: String,
    pub attempts: u32,
    #[source]
    pub error: DriverError,
}

/// Runs fallible operations under a [`RetryPolicy`].
pub struct RetryExecutor {
    policy: RetryPolicy,
    logger: Arc<TestLogger>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, logger: Arc<TestLogger>) -> Self {
        Self { policy, logger }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invokes `operation` until it succeeds, a non-retryable failure
    /// occurs, or the attempt budget is exhausted.
    pub async fn execute<T, F, Fut>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        let max = self.policy.max_attempts();
        let mut attempt = 1u32;
        loop {
            self.logger.debug(
                format!("attempt {attempt}/{max} for {operation_name}"),
                Some("retry"),
                None,
            );

            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let kind = error.classification();
            let retryable = kind.map(|k| self.policy.is_retryable(k)).unwrap_or(false);

            if !retryable {
                self.logger.debug(
                    format!("{operation_name} failed without retry: {error}"),
                    Some("retry"),
                    Some(json!({ "classification": kind })),
                );
                return Err(RetryFailure {
                    operation: operation_name.to_string(),
                    attempts: attempt,
                    error,
                });
            }

            if attempt >= max {
                self.logger.error(
                    format!("all {max} attempts failed for {operation_name}: {error}"),
                    Some("retry"),
                    Some(json!({ "classification": kind })),
                );
                return Err(RetryFailure {
                    operation: operation_name.to_string(),
                    attempts: attempt,
                    error,
                });
            }

            let delay = self.policy.delay_for(attempt);
            self.logger.warn(
                format!(
                    "attempt {attempt} for {operation_name} failed: {error}; retrying in {delay:?}"
                ),
                Some("retry"),
                Some(json!({ "classification": kind })),
            );
            if !delay.is_zero() {
                sleep(delay).await;
            }
            attempt += 1;
        }
    }
}
