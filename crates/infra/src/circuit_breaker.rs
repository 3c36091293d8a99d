//! Circuit breaker guarding calls to a failing dependency.
//!
//! ```text
//! CLOSED ──(failures >= threshold)──► OPEN
//!   ▲                                  │ reset_timeout elapsed
//!   │ trial ok                         ▼
//!   └──────────────────────────── HALF_OPEN ──(trial fails)──► OPEN
//! ```
//!
//! One breaker instance is shared by every caller of the guarded dependency
//! (`Arc<CircuitBreaker>`). State lives behind a mutex and every transition
//! happens under the lock; the lock is never held across an `.await`.
//!
//! While HALF_OPEN a single trial call is admitted; concurrent callers are
//! treated as if the circuit were OPEN. A trial that is dropped before it
//! completes sends the breaker back to OPEN.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call is allowed.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_millis(30_000),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CircuitBreakerError<E> {
    /// Rejected without invoking the operation.
    #[error("Circuit is OPEN")]
    Open,

    /// The operation ran and failed.
    #[error(transparent)]
    Inner(E),
}

/// Serializable view of the breaker, for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
    Rejected,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.config.failure_threshold,
            reset_timeout_ms: self.config.reset_timeout.as_millis() as u64,
        }
    }

    /// Run `op` through the breaker.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = self.admit();
        if admission == Admission::Rejected {
            return Err(CircuitBreakerError::Open);
        }

        let guard = TrialGuard {
            breaker: self,
            armed: admission == Admission::Trial,
        };
        let result = op().await;
        guard.disarm();

        match &result {
            Ok(_) => self.on_success(admission),
            Err(_) => self.on_failure(admission),
        }
        result.map_err(CircuitBreakerError::Inner)
    }

    /// Run `op` through the breaker; when the circuit is open or `op` fails,
    /// return whatever `fallback` produces instead.
    pub async fn call_with_fallback<F, Fut, FB, FbFut, T, E>(
        &self,
        op: F,
        fallback: FB,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce(CircuitBreakerError<E>) -> FbFut,
        FbFut: Future<Output = Result<T, E>>,
    {
        match self.call(op).await {
            Ok(value) => Ok(value),
            Err(err) => fallback(err).await,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> Admission {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Admission::Normal,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .is_none_or(|at| at.elapsed() > self.config.reset_timeout);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    info!(breaker = %self.name, state = "HALF_OPEN", "circuit admitting trial call");
                    Admission::Trial
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    Admission::Rejected
                } else {
                    inner.trial_in_flight = true;
                    Admission::Trial
                }
            }
        }
    }

    fn on_success(&self, admission: Admission) {
        let mut inner = self.lock();
        match admission {
            Admission::Trial => {
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.trial_in_flight = false;
                info!(breaker = %self.name, state = "CLOSED", "circuit closed after successful trial");
            }
            // A late success must not close a circuit other callers opened.
            Admission::Normal if inner.state == CircuitState::Closed => inner.failure_count = 0,
            _ => {}
        }
    }

    fn on_failure(&self, admission: Admission) {
        let mut inner = self.lock();
        match admission {
            Admission::Trial => {
                inner.state = CircuitState::Open;
                inner.failure_count += 1;
                inner.last_failure = Some(Instant::now());
                inner.trial_in_flight = false;
                warn!(breaker = %self.name, state = "OPEN", "trial call failed, circuit re-opened");
            }
            Admission::Normal if inner.state == CircuitState::Closed => {
                inner.failure_count += 1;
                inner.last_failure = Some(Instant::now());
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    warn!(
                        breaker = %self.name,
                        state = "OPEN",
                        failure_count = inner.failure_count,
                        "failure threshold reached, circuit opened"
                    );
                }
            }
            _ => {}
        }
    }

    fn abandon_trial(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen && inner.trial_in_flight {
            inner.state = CircuitState::Open;
            inner.last_failure = Some(Instant::now());
            inner.trial_in_flight = false;
            warn!(breaker = %self.name, state = "OPEN", "trial call cancelled, circuit re-opened");
        }
    }
}

/// Re-opens the circuit if a trial future is dropped mid-flight.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl TrialGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_trial();
        }
    }
}
