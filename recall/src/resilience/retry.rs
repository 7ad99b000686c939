//! Exponential backoff with jitter (§4.8), built on the `backoff` crate the
//! teacher already configures by hand for async-openai's client
//! (`llm/api.rs`'s `backoff::ExponentialBackoff`), generalized here into a
//! reusable retry wrapper for any fallible async operation.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    /// Spread applied around each computed interval, e.g. `0.5` for ±50%.
    pub randomization_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(500),
            multiplier: 2.0,
            max_interval: Duration::from_secs(5),
            randomization_factor: 0.5,
        }
    }
}

impl RetryConfig {
    /// Store-acquisition default named in §4.8: short attempts, small delays.
    pub fn store_acquisition() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(100),
            multiplier: 2.0,
            max_interval: Duration::from_secs(1),
            randomization_factor: 0.5,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            multiplier: self.multiplier,
            max_interval: self.max_interval,
            randomization_factor: self.randomization_factor,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Retries `op` up to `config.max_attempts` times with exponential backoff
/// and jitter. Only errors for which `is_retryable` returns true are
/// retried; any other error (or the attempt that exhausts the budget) is
/// returned immediately.
pub async fn retry_with_backoff<T, F, Fut>(config: &RetryConfig, is_retryable: impl Fn(&CoreError) -> bool, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = config.backoff();
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= config.max_attempts || !is_retryable(&e) {
                    return Err(e);
                }
                let delay = backoff.next_backoff().unwrap_or(config.max_interval);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// True for the error kinds §4.8 classifies as transient (worth retrying):
/// upstream unavailability and explicitly transient failures. Everything
/// else (validation, auth, not-found, quota) is a terminal error.
pub fn is_transient(error: &CoreError) -> bool {
    matches!(error, CoreError::UpstreamUnavailable(_) | CoreError::Transient(_))
}
