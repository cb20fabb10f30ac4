//! Circuit breaker guarding calls to an unreliable collaborator.
//!
//! - **Closed**: calls pass through, consecutive failures are counted.
//! - **Open**: calls are rejected without reaching the collaborator until the
//!   open duration elapses.
//! - **HalfOpen**: at most `success_threshold` probe calls are let through;
//!   further calls are rejected while probes are outstanding. Enough probe
//!   successes close the circuit, a single failure opens it again.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: usize,
    /// Time spent Open before the next call is allowed as a probe
    pub open_duration: Duration,
    /// Probe successes in HalfOpen before the circuit closes
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(10),
            success_threshold: 2,
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Errors from a guarded call.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the call was not attempted
    #[error("Circuit breaker is open")]
    Open,
    /// The call was attempted and failed
    #[error("{0}")]
    Inner(E),
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: usize,
    half_open_successes: usize,
    half_open_in_flight: usize,
    opened_at: Option<Instant>,
}

/// How a call was admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Probe,
}

/// Counters exposed for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

/// Circuit breaker shared by every caller of one collaborator.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
    total_calls: AtomicU64,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    total_rejections: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                half_open_in_flight: 0,
                opened_at: None,
            }),
            total_calls: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
        }
    }

    /// Current state, without triggering the Open -> HalfOpen transition.
    pub async fn state(&self) -> CircuitState {
        self.state.read().await.state
    }

    /// Runs `operation` through the breaker.
    ///
    /// # Errors
    ///
    /// `CircuitBreakerError::Open` when the circuit rejects the call,
    /// `CircuitBreakerError::Inner` when the operation itself fails.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let Some(admission) = self.try_acquire().await else {
            self.total_rejections.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Circuit breaker is open, rejecting call");
            return Err(CircuitBreakerError::Open);
        };

        match operation().await {
            Ok(value) => {
                self.on_success(admission).await;
                self.total_successes.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            Err(err) => {
                self.on_failure().await;
                self.total_failures.fetch_add(1, Ordering::Relaxed);
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    async fn try_acquire(&self) -> Option<Admission> {
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::HalfOpen => {
                let outstanding = state.half_open_successes + state.half_open_in_flight;
                if outstanding < self.config.success_threshold {
                    state.half_open_in_flight += 1;
                    Some(Admission::Probe)
                } else {
                    None
                }
            }
            CircuitState::Open => {
                let cooled_down = state
                    .opened_at
                    .is_some_and(|opened_at| opened_at.elapsed() >= self.config.open_duration);

                if !cooled_down {
                    return None;
                }

                tracing::info!("Circuit breaker transitioning OPEN -> HALF_OPEN");
                state.state = CircuitState::HalfOpen;
                state.half_open_successes = 0;
                state.half_open_in_flight = 1;
                Some(Admission::Probe)
            }
        }
    }

    async fn on_success(&self, admission: Admission) {
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures = 0;
            }
            // only probe outcomes decide whether the circuit closes
            CircuitState::HalfOpen if admission == Admission::Normal => {}
            CircuitState::HalfOpen => {
                state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
                state.half_open_successes += 1;
                if state.half_open_successes >= self.config.success_threshold {
                    tracing::info!(
                        successes = state.half_open_successes,
                        "Circuit breaker transitioning HALF_OPEN -> CLOSED"
                    );
                    state.state = CircuitState::Closed;
                    state.consecutive_failures = 0;
                    state.half_open_successes = 0;
                    state.half_open_in_flight = 0;
                    state.opened_at = None;
                }
            }
            // a call admitted before another task opened the circuit
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = state.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        "Circuit breaker transitioning CLOSED -> OPEN"
                    );
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!("Circuit breaker transitioning HALF_OPEN -> OPEN (probe failed)");
                state.state = CircuitState::Open;
                state.half_open_successes = 0;
                state.half_open_in_flight = 0;
                state.opened_at = Some(Instant::now());
            }
            CircuitState::Open => {
                state.consecutive_failures += 1;
            }
        }
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }
}
