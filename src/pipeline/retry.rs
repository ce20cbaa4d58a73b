//! Exponential-backoff retry for flaky collaborators

use crate::config::AnalysisSettings;
use crate::error::{AnalysisError, ErrorCode, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt budget and backoff base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self::new(settings.max_retries, settings.retry_base_delay)
    }

    /// Delay before attempt `attempt + 1`, where `attempt` counts from 1
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Transient failures worth another attempt
pub fn should_retry(error: &AnalysisError) -> bool {
    error.retryable || error.code == ErrorCode::UnknownError
}

/// Run `op` until it succeeds, fails permanently or the budget runs out
pub async fn retry<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", what, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < policy.max_attempts && should_retry(&e) => {
                let delay = policy.delay(attempt);
                warn!(
                    code = e.code.as_str(),
                    "{} attempt {}/{} failed, retrying in {:?}: {}",
                    what,
                    attempt,
                    policy.max_attempts,
                    delay,
                    e.message
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e.with_detail("attempts", attempt)),
        }
    }
}
