//! Three-state circuit breaker (§4.8), grounded on the resilience crate's
//! `CircuitBreaker` (atomics for counters, an `RwLock<Instant>` deadline,
//! numeric state encoding) but reworked to return `CoreError` and to honor
//! the spec's `half_open_max_calls` admission limit during recovery probing.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub name: String,
    pub failure_threshold: u64,
    pub success_threshold: u64,
    pub timeout: Duration,
    pub half_open_max_calls: u32,
}

impl CircuitBreakerConfig {
    /// Per-provider defaults named in §4.8.
    pub fn embedder() -> Self {
        Self { name: "embedder".into(), failure_threshold: 3, success_threshold: 2, timeout: Duration::from_secs(60), half_open_max_calls: 1 }
    }

    pub fn extractor() -> Self {
        Self { name: "extractor".into(), failure_threshold: 5, success_threshold: 2, timeout: Duration::from_secs(30), half_open_max_calls: 1 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u64,
    pub success_count: u64,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU64,
    success_count: AtomicU64,
    half_open_inflight: AtomicU32,
    next_attempt: Arc<RwLock<Instant>>,
}

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(CLOSED),
            failure_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            half_open_inflight: AtomicU32::new(0),
            next_attempt: Arc::new(RwLock::new(Instant::now())),
        }
    }

    pub fn state(&self) -> CircuitState {
        match self.state.load(Ordering::Relaxed) {
            CLOSED => CircuitState::Closed,
            OPEN => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.state(),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
        }
    }

    /// Runs `op` under breaker protection. Returns `CoreError::UpstreamUnavailable`
    /// immediately when the circuit is OPEN (not yet past `timeout`) or when
    /// HALF_OPEN admission is exhausted, without invoking `op`.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.state.load(Ordering::Relaxed) == OPEN {
            if Instant::now() < *self.next_attempt.read().await {
                return Err(CoreError::UpstreamUnavailable(format!("circuit '{}' is open", self.config.name)));
            }
            self.state.store(HALF_OPEN, Ordering::Relaxed);
            self.success_count.store(0, Ordering::Relaxed);
            self.half_open_inflight.store(0, Ordering::Relaxed);
        }

        if self.state.load(Ordering::Relaxed) == HALF_OPEN {
            let inflight = self.half_open_inflight.fetch_add(1, Ordering::Relaxed);
            if inflight >= self.config.half_open_max_calls {
                self.half_open_inflight.fetch_sub(1, Ordering::Relaxed);
                return Err(CoreError::UpstreamUnavailable(format!("circuit '{}' is half-open, probe slots exhausted", self.config.name)));
            }
        }

        match op().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(e) => {
                self.on_failure().await;
                Err(e)
            }
        }
    }

    async fn on_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        if self.state.load(Ordering::Relaxed) == HALF_OPEN {
            let successes = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
            if successes >= self.config.success_threshold {
                self.state.store(CLOSED, Ordering::Relaxed);
                self.success_count.store(0, Ordering::Relaxed);
                tracing::warn!(circuit = %self.config.name, "circuit breaker closed after recovery");
            }
        }
    }

    async fn on_failure(&self) {
        let was_half_open = self.state.load(Ordering::Relaxed) == HALF_OPEN;
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;

        if was_half_open || failures >= self.config.failure_threshold {
            self.state.store(OPEN, Ordering::Relaxed);
            *self.next_attempt.write().await = Instant::now() + self.config.timeout;
            self.success_count.store(0, Ordering::Relaxed);
            tracing::warn!(circuit = %self.config.name, failures, "circuit breaker opened");
        }
    }
}
