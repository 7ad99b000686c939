//! Retry and circuit-breaking for calls to external providers and the store
//! (§4.8). `retry` wraps a single call in bounded exponential backoff;
//! `circuit_breaker` tracks a provider's health across calls and short-
//! circuits once it has failed too often. `with_resilience` composes both:
//! the breaker decides whether to attempt at all, the retry loop governs
//! what happens within one admitted attempt.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use retry::{is_transient, retry_with_backoff, RetryConfig};

use std::future::Future;

use crate::error::Result;

/// Runs `op` through the circuit breaker, retrying transient failures inside
/// each admitted attempt. A breaker that is OPEN fails fast without ever
/// invoking `op` or consuming a retry attempt.
pub async fn with_resilience<T, F, Fut>(breaker: &CircuitBreaker, retry_config: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    breaker.call(|| retry_with_backoff(retry_config, is_transient, &mut op)).await
}
