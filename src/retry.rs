//! Backoff retry for unreliable async calls.
//!
//! `RetryExecutor` runs an operation up to `max_retries` times, sleeping
//! `min(base * multiplier^(attempt - 1), max)` between attempts. The only
//! permanent failure it reports is `ApiError::RetryExhausted`; an error that
//! `ApiError::is_permanent` rejects ends the retries after that attempt.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Retry schedule shared by the provider adapters and the job queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Delay after the first failed attempt (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for any single delay (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Job-level schedule: 3 attempts, 5s then 10s (20s cap).
    pub fn job_default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 5_000,
            max_delay_ms: 20_000,
            backoff_multiplier: 2.0,
        }
    }

    /// Attempt count actually used; a policy of zero still runs once.
    pub fn attempts(&self) -> usize {
        self.max_retries.max(1)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        let raw = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Sum of the delays slept before attempt `failures + 1`.
    pub fn total_delay(&self, failures: usize) -> Duration {
        (1..=failures).map(|attempt| self.delay_for_attempt(attempt)).sum()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("max_retries must be at least 1".to_string());
        }
        if !(self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0) {
            return Err(format!(
                "backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(format!(
                "max_delay_ms ({}) must not be below base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            ));
        }
        Ok(())
    }
}

/// Runs a fallible async operation under a `RetryPolicy`.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    cancel: Option<CancellationToken>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: None,
        }
    }

    /// Stop retrying once `token` is cancelled. Checked before every attempt
    /// and while waiting out a backoff delay; an attempt already in flight is
    /// allowed to finish.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation`, passing the 1-based attempt number.
    pub async fn execute<T, F, Fut>(&self, context: &str, mut operation: F) -> Result<T, ApiError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.policy.attempts();
        let mut attempt = 1;

        loop {
            self.check_cancelled(context)?;

            let last_error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if matches!(last_error, ApiError::Cancelled(_)) {
                return Err(last_error);
            }
            if last_error.is_permanent() {
                error!(
                    context,
                    attempt,
                    code = last_error.code(),
                    error = %last_error,
                    "Attempt failed with a non-retryable error"
                );
                return Err(ApiError::RetryExhausted {
                    context: context.to_string(),
                    attempts: attempt,
                    last_error: Box::new(last_error),
                });
            }

            if attempt >= max_attempts {
                error!(
                    context,
                    attempt,
                    error = %last_error,
                    "All {} retry attempts failed",
                    max_attempts
                );
                return Err(ApiError::RetryExhausted {
                    context: context.to_string(),
                    attempts: attempt,
                    last_error: Box::new(last_error),
                });
            }

            let delay = self.policy.delay_for_attempt(attempt);
            warn!(
                context,
                attempt,
                next_retry_ms = delay.as_millis() as u64,
                error = %last_error,
                "Attempt failed, retrying"
            );

            match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => {
                            return Err(ApiError::Cancelled(context.to_string()));
                        }
                        _ = sleep(delay) => {}
                    }
                }
                None => sleep(delay).await,
            }

            attempt += 1;
        }
    }

    fn check_cancelled(&self, context: &str) -> Result<(), ApiError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(ApiError::Cancelled(context.to_string())),
            _ => Ok(()),
        }
    }
}
