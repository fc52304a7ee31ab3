//! Circuit breaker for chronically failing dependencies
//!
//! Stops calling a dependency after a run of consecutive failures, rejects
//! further calls for a cool-down window, then probes with a limited number of
//! calls before fully closing again.

use std::sync::{Arc, Mutex};

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::CircuitBreakerConfig;

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through
    Closed,
    /// Dependency is failing, calls are rejected immediately
    Open,
    /// Testing recovery, calls pass through while successes accumulate
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Rejection issued while the circuit is open
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitOpen {
    /// Instant after which a probe call will be admitted
    pub retry_after: Instant,
}

/// Observer invoked synchronously with `(new_state, consecutive_failures)`
/// on every state transition
pub type StateObserver = Arc<dyn Fn(CircuitState, u32) + Send + Sync>;

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure: Option<Instant>,
}

/// Circuit breaker guarding one downstream dependency
///
/// One instance is shared by all concurrent callers of that dependency; state
/// updates are serialized behind a mutex held only for the update itself.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    observer: Option<StateObserver>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure: None,
            }),
            observer: None,
        }
    }

    /// Create a circuit breaker with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Register a state-change observer
    pub fn with_observer(mut self, observer: impl Fn(CircuitState, u32) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    /// Gate a call
    ///
    /// Returns `Ok(())` when the call may proceed. While open, returns the
    /// rejection without any side effects until the reset window elapses, at
    /// which point the next caller flips the breaker to half-open and is
    /// admitted as the probe.
    pub fn try_acquire(&self) -> Result<(), CircuitOpen> {
        let mut notify = None;
        let result = {
            let mut inner = self.inner.lock().expect("breaker lock poisoned");
            match inner.state {
                CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
                CircuitState::Open => {
                    let last = inner.last_failure.unwrap_or_else(Instant::now);
                    let retry_after = last + self.config.reset_timeout();
                    if Instant::now() >= retry_after {
                        inner.state = CircuitState::HalfOpen;
                        inner.consecutive_successes = 0;
                        notify = Some((CircuitState::HalfOpen, inner.consecutive_failures));
                        Ok(())
                    } else {
                        Err(CircuitOpen { retry_after })
                    }
                }
            }
        };
        self.notify(notify);
        result
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut notify = None;
        {
            let mut inner = self.inner.lock().expect("breaker lock poisoned");
            match inner.state {
                CircuitState::Closed => {
                    inner.consecutive_failures = 0;
                }
                CircuitState::HalfOpen => {
                    inner.consecutive_successes += 1;
                    if inner.consecutive_successes >= self.config.success_threshold {
                        inner.state = CircuitState::Closed;
                        inner.consecutive_failures = 0;
                        inner.consecutive_successes = 0;
                        notify = Some((CircuitState::Closed, 0));
                    }
                }
                // A success while open means the recording caller was admitted
                // before the breaker tripped; the cool-down stays in force.
                CircuitState::Open => {}
            }
        }
        self.notify(notify);
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut notify = None;
        {
            let mut inner = self.inner.lock().expect("breaker lock poisoned");
            inner.consecutive_successes = 0;
            match inner.state {
                CircuitState::Closed => {
                    inner.consecutive_failures += 1;
                    if inner.consecutive_failures >= self.config.failure_threshold {
                        inner.state = CircuitState::Open;
                        inner.last_failure = Some(Instant::now());
                        notify = Some((CircuitState::Open, inner.consecutive_failures));
                    }
                }
                CircuitState::HalfOpen => {
                    inner.state = CircuitState::Open;
                    inner.consecutive_failures += 1;
                    inner.last_failure = Some(Instant::now());
                    notify = Some((CircuitState::Open, inner.consecutive_failures));
                }
                CircuitState::Open => {
                    inner.consecutive_failures += 1;
                }
            }
        }
        self.notify(notify);
    }

    fn notify(&self, transition: Option<(CircuitState, u32)>) {
        let Some((state, failures)) = transition else {
            return;
        };
        match state {
            CircuitState::Open => warn!(
                state = %state,
                consecutive_failures = failures,
                "Circuit breaker opened"
            ),
            _ => debug!(state = %state, "Circuit breaker state change"),
        }
        if let Some(observer) = &self.observer {
            observer(state, failures);
        }
    }
}
