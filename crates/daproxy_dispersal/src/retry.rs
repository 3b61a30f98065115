//! Put retry policy.

use crate::config::RetryConfig;
use crate::error::{ClientError, DispersalError, DispersalResult, StatusCode};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up and surface the error.
    Stop,
    /// Retry after the exponential backoff for the attempt.
    Retry,
    /// Retry after a fixed pause.
    RetryAfter(Duration),
}

/// Drives dispersal attempts according to a [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy.
    ///
    /// # Errors
    ///
    /// Returns [`DispersalError::InvalidConfig`] if `put_tries` is zero.
    pub fn new(config: RetryConfig) -> DispersalResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Attempt bound, or `None` when retrying forever.
    pub fn max_attempts(&self) -> Option<u32> {
        u32::try_from(self.config.put_tries).ok()
    }

    /// Classifies a failed attempt.
    pub fn decide(&self, err: &DispersalError) -> RetryDecision {
        match err {
            DispersalError::Client(ClientError::Status { code, .. }) => match code {
                StatusCode::InvalidArgument => RetryDecision::Stop,
                StatusCode::ResourceExhausted => {
                    RetryDecision::RetryAfter(self.config.resource_exhausted_backoff)
                }
                _ => RetryDecision::Retry,
            },
            DispersalError::Client(_)
            | DispersalError::Verify(_)
            | DispersalError::ConfirmationTimeout(_) => RetryDecision::Retry,
            DispersalError::InvalidConfig(_) | DispersalError::Codec(_) => RetryDecision::Stop,
        }
    }

    /// Runs `op` until it succeeds, the error is final, or attempts run out.
    ///
    /// `op` receives the 0-indexed attempt number. Only the last error is
    /// returned. Dropping the returned future cancels the loop.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> DispersalResult<T>
    where
        F: FnMut(u32) -> Fut + Send,
        Fut: Future<Output = DispersalResult<T>> + Send,
    {
        let max_attempts = self.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            let err = match op(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "dispersal succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };
            attempt = attempt.saturating_add(1);

            let delay = match self.decide(&err) {
                RetryDecision::Stop => {
                    debug!(error = %err, "dispersal error is not retryable");
                    return Err(err);
                }
                RetryDecision::Retry => self.config.delay_for_attempt(attempt),
                RetryDecision::RetryAfter(pause) => pause,
            };

            if max_attempts.is_some_and(|max| attempt >= max) {
                warn!(attempts = attempt, error = %err, "dispersal attempts exhausted");
                return Err(err);
            }

            warn!(attempt, ?delay, error = %err, "dispersal attempt failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}
