//! Retry logic for page requests and backoff for failed cycles
//!
//! A page request is retried up to [`RetryConfig::max_retries`] times when the
//! failure is transient (transport error or non-success status). Decode and
//! authentication failures are permanent and abort immediately.
//!
//! Failed refresh cycles are a different matter: the scheduler does not retry
//! them in place but pushes the location's next attempt out by
//! [`backoff_delay`].

use crate::config::{BackoffConfig, RetryConfig};
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies failures as transient or permanent
pub trait IsRetryable {
    /// Whether repeating the request could succeed
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Transport failures: connection, timeout, reset
            Error::Network(_) => true,
            // Upstream hiccups (502/503/504 and friends) are common on ESI
            Error::Status { .. } => true,
            // A body that does not decode will not decode on retry either
            Error::Decode(_) => false,
            Error::Auth(_) => false,
            Error::Storage { .. } => false,
            Error::Io(_) => false,
            Error::Serialization(_) => false,
            Error::Url(_) => false,
            Error::Config { .. } => false,
            Error::NotFound(_) => false,
            Error::ApiServerError(_) => false,
        }
    }
}

/// Execute an async operation, retrying transient failures
///
/// The operation runs at most `config.max_retries + 1` times. Delays grow
/// exponentially from `initial_delay` up to `max_delay`; a zero initial delay
/// retries immediately.
pub async fn fetch_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis(),
                    "Request failed, retrying"
                );

                if !delay.is_zero() {
                    let jittered_delay = if config.jitter {
                        add_jitter(delay)
                    } else {
                        delay
                    };
                    tokio::time::sleep(jittered_delay).await;
                }

                let next_delay =
                    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
                        .unwrap_or(config.max_delay);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(error = %e, attempts = attempt + 1, "Giving up on request");
                } else {
                    tracing::debug!(error = %e, "Request failed permanently");
                }
                return Err(e);
            }
        }
    }
}

/// Delay before a location is serviced again after `failures` consecutive failed cycles
///
/// Returns zero when `failures` is zero or the initial delay is zero.
pub fn backoff_delay(config: &BackoffConfig, failures: u32) -> Duration {
    if failures == 0 || config.initial_delay.is_zero() {
        return Duration::ZERO;
    }

    let exponent = (failures - 1).min(32) as i32;
    let secs = config.initial_delay.as_secs_f64() * config.multiplier.max(1.0).powi(exponent);
    let delay = Duration::try_from_secs_f64(secs.min(config.max_delay.as_secs_f64()))
        .unwrap_or(config.max_delay);

    if config.jitter {
        add_jitter(delay).min(config.max_delay)
    } else {
        delay
    }
}

/// Stretch a delay by a random factor
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
