//! Bounded retry with fixed backoff
//!
//! Transient store and gateway failures are retried a small, fixed number of
//! times; anything else is returned immediately.

use std::future::Future;
use std::time::Duration;
use tracing::warn;
use crate::utils::errors::{EncontroError, Result};

/// Retry policy: attempt count and fixed pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Policy used for batch reads feeding the periodic passes
    pub fn batch_fetch() -> Self {
        Self::new(3, Duration::from_secs(2))
    }

    /// Policy used when pushing notifications to the gateway
    pub fn delivery() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}

/// Run `operation` until it succeeds, fails permanently, or the attempts run out
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, operation_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.attempts => {
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    max_attempts = policy.attempts,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Convenience for the retry helper callers that only have a message
pub fn store_unavailable(message: impl Into<String>) -> EncontroError {
    EncontroError::Store(message.into())
}
