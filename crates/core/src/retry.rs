//! Backoff for flaky radio operations
//!
//! Scans miss advertisements and GATT connects fail while the station is
//! busy, so connection setup runs through [`retry_async`]. Only errors
//! that [`Error::is_transient`] accepts are retried; a missing adapter or a
//! bad config fails on the first attempt.
//!
//! # Example
//!
//! ```rust,no_run
//! use meteo_core::retry::{retry_async, RetryConfig};
//!
//! # async fn demo() -> meteo_core::Result<()> {
//! let outcome = retry_async(RetryConfig::default(), "read", |attempt| async move {
//!     Ok::<_, meteo_core::Error>(attempt)
//! })
//! .await?;
//! assert_eq!(outcome.attempts, 1);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, ErrorCode, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::RandomState;
use std::future::Future;
use std::hash::BuildHasher;
use std::time::{Duration, Instant};

/// Upper bound of the random stretch applied to each backoff
const JITTER_FRACTION: f64 = 0.25;

/// Retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts in total, the first one included
    pub max_attempts: u32,
    /// Pause before the second attempt
    pub initial_delay: Duration,
    /// Cap for any single pause
    pub max_delay: Duration,
    /// Growth of the pause per attempt
    pub backoff_multiplier: f64,
    /// Stretch each pause by up to a quarter
    pub jitter: bool,
    /// Give up on an attempt after this long
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            backoff_multiplier: 2.0,
            jitter: true,
            attempt_timeout: None,
        }
    }
}

impl RetryConfig {
    /// Bound every attempt by `timeout`
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Pause before attempt number `attempt` (1-based); none before the first.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let secs = (self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent))
            .min(self.max_delay.as_secs_f64());

        let stretch = if self.jitter {
            1.0 + unit_random() * JITTER_FRACTION
        } else {
            1.0
        };
        Duration::from_secs_f64(secs * stretch)
    }
}

/// Uniform-ish value in `[0, 1)` from the std hasher's random keys.
fn unit_random() -> f64 {
    (RandomState::new().hash_one(Instant::now()) % 1000) as f64 / 1000.0
}

/// A value that needed `attempts` tries.
#[derive(Debug)]
pub struct RetryResult<T> {
    /// The successful result
    pub value: T,
    /// Tries made, 1 when the first one worked
    pub attempts: u32,
    /// Time from the first try to success, pauses included
    pub total_duration: Duration,
}

/// Run `f` until it succeeds, fails with a non-transient error, or the
/// attempts run out.
///
/// `f` receives the 1-based attempt number. An attempt exceeding
/// `attempt_timeout` fails with [`ErrorCode::Timeout`], which is transient.
/// The final error carries `"<operation> failed after N attempts"` as
/// context.
pub async fn retry_async<F, Fut, T>(
    config: RetryConfig,
    operation: &str,
    mut f: F,
) -> Result<RetryResult<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let max_attempts = config.max_attempts.max(1);

    let mut attempt = 1;
    loop {
        tokio::time::sleep(config.backoff(attempt)).await;

        let outcome = match config.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, f(attempt))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::new(
                        ErrorCode::Timeout,
                        format!("{} timed out after {:?}", operation, limit),
                    ))
                }),
            None => f(attempt).await,
        };

        let err = match outcome {
            Ok(value) => {
                return Ok(RetryResult {
                    value,
                    attempts: attempt,
                    total_duration: start.elapsed(),
                });
            }
            Err(err) => err,
        };

        if attempt == max_attempts || !err.is_transient() {
            return Err(err.with_context(format!("{} failed after {} attempts", operation, attempt)));
        }
        tracing::warn!(operation, attempt, error = %err.message, "retrying");
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = no_jitter();
        assert_eq!(config.backoff(1), Duration::ZERO);
        assert_eq!(config.backoff(2), Duration::from_millis(100));
        assert_eq!(config.backoff(3), Duration::from_millis(200));
        assert_eq!(config.backoff(4), Duration::from_millis(300));
        assert_eq!(config.backoff(40), Duration::from_millis(300));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = RetryConfig {
            jitter: true,
            ..no_jitter()
        };
        for _ in 0..20 {
            let delay = config.backoff(2);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(125));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = retry_async(RetryConfig::default(), "connect", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(Error::bluetooth("link dropped"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.value, 2);
        assert_eq!(result.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = retry_async(RetryConfig::default(), "connect", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::adapter_not_found()) }
        })
        .await
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::AdapterNotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(err.context.unwrap().contains("after 1 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout() {
        let config = RetryConfig {
            max_attempts: 2,
            ..RetryConfig::default()
        }
        .with_attempt_timeout(Duration::from_millis(50));

        let err = retry_async(config, "connect", |_| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::Timeout);
        assert!(err.context.unwrap().contains("after 2 attempts"));
    }
}
