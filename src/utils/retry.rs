//! Retry utilities with exponential backoff for upstream calls.
//!
//! The client drives the retry loop, so every attempt takes its own rate
//! limiter token. Every request the client issues is idempotent (a page fetch
//! with the same cursor returns the same result set), so repeating it after a
//! transient failure is safe.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::ArchiveError;
use crate::transport::TransportError;

/// Errors that know whether repeating the call could succeed
pub trait Retryable: Display {
    fn is_transient(&self) -> bool;

    /// Server-requested wait before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for TransportError {
    fn is_transient(&self) -> bool {
        TransportError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        TransportError::retry_after(self)
    }
}

impl Retryable for ArchiveError {
    fn is_transient(&self) -> bool {
        ArchiveError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ArchiveError::Transport(e) => e.retry_after(),
            _ => None,
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the maximum number of attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the initial delay
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Backoff delay before attempt `attempt + 1`, given `attempt` failures so far.
    ///
    /// A server-supplied `Retry-After` wins over the computed backoff but is
    /// still capped at `max_delay`.
    pub fn delay_for<E: Retryable>(&self, attempt: u32, error: &E) -> Duration {
        let exp = self.initial_delay.as_secs_f64()
            * self
                .backoff_multiplier
                .powf(attempt.saturating_sub(1) as f64);
        let backoff = Duration::from_secs_f64(exp.min(self.max_delay.as_secs_f64()));

        match error.retry_after() {
            Some(after) => after.min(self.max_delay),
            None => backoff,
        }
    }
}

/// Execute an async operation, retrying transient failures.
///
/// Permanent failures (4xx other than 429, decode errors, cancellation) are
/// returned immediately. Once `max_attempts` is exhausted the last error is
/// returned.
pub async fn with_retry<T, E, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    tracing::info!(
                        attempts,
                        "Request succeeded after {} transient failures",
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Err(error) if error.is_transient() && attempts < config.max_attempts => {
                let delay = config.delay_for(attempts, &error);
                tracing::warn!(
                    attempt = attempts,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Transient transport error, retrying: {}",
                    error
                );
                sleep(delay).await;
            }
            Err(error) => {
                if error.is_transient() {
                    tracing::warn!("Request failed after {} attempts: {}", attempts, error);
                }
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig::default()
            .max_attempts(max_attempts)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry(fast_config(3), || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(TransportError::Timeout)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = with_retry(fast_config(2), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Connect("refused".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(TransportError::Connect(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = with_retry(fast_config(5), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Status {
                    status: 404,
                    message: "not found".into(),
                    retry_after: None,
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_backoff_and_retry_after() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            backoff_multiplier: 2.0,
        };

        assert_eq!(
            config.delay_for(1, &TransportError::Timeout),
            Duration::from_millis(100)
        );
        assert_eq!(
            config.delay_for(2, &TransportError::Timeout),
            Duration::from_millis(200)
        );
        // capped
        assert_eq!(
            config.delay_for(3, &TransportError::Timeout),
            Duration::from_millis(250)
        );

        let throttled = TransportError::Status {
            status: 429,
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(config.delay_for(1, &throttled), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_cancellation_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), ArchiveError> = with_retry(fast_config(4), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ArchiveError::Cancelled)
            }
        })
        .await;

        assert!(matches!(result, Err(ArchiveError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_archive_error_keeps_retry_hint() {
        let err: ArchiveError = TransportError::Status {
            status: 429,
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(2)),
        }
        .into();
        assert!(Retryable::is_transient(&err));
        assert_eq!(Retryable::retry_after(&err), Some(Duration::from_secs(2)));
        assert_eq!(
            Retryable::retry_after(&ArchiveError::NotFound("x".into())),
            None
        );
    }

    #[test]
    fn test_disabled_policy() {
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
        assert_eq!(RetryConfig::default().max_attempts(0).max_attempts, 1);
    }
}
