//! Capped retry for remote operations.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{TransferError, TransferResult};
use crate::{DEFAULT_MAX_ATTEMPTS, TRACING_TARGET_UPLOAD};

/// How often, and how far apart, a failed remote operation is attempted.
///
/// The default is five attempts with no delay between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Create a policy that attempts each operation exactly once.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Set the pause between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Runs `operation` until one attempt succeeds, a non-retryable error is
    /// returned, the attempt cap is reached, or `cancel` fires.
    ///
    /// Only the result of the current attempt decides success; an earlier
    /// failure is never carried into a later attempt. `operation` receives the
    /// one-based attempt number.
    pub async fn run<F, Fut, T>(
        &self,
        operation: &'static str,
        key: &str,
        cancel: &CancellationToken,
        mut attempt_fn: F,
    ) -> TransferResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, stow_object::Error>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            attempt += 1;

            let error = match attempt_fn(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_retryable() {
                tracing::debug!(
                    target: TRACING_TARGET_UPLOAD,
                    operation,
                    key,
                    error = %error,
                    "non-retryable error, failing immediately"
                );
                return Err(TransferError::Remote {
                    operation,
                    key: key.to_string(),
                    source: error,
                });
            }

            if attempt >= max_attempts {
                return Err(TransferError::RetriesExhausted {
                    operation,
                    key: key.to_string(),
                    attempts: attempt,
                    source: error,
                });
            }

            tracing::warn!(
                target: TRACING_TARGET_UPLOAD,
                operation,
                key,
                attempt,
                max_attempts,
                error = %error,
                "remote operation failed, retrying"
            );

            if !self.delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
        }
    }
}
