//! Per-upstream circuit breaker
//!
//! Trips after `fail_max` consecutive failures and rejects calls without
//! running them until `timeout` has passed. After that a single trial call is
//! let through: success closes the circuit, failure re-opens it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hyperion_core::{Clock, SystemClock};

/// Breaker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker
    pub fail_max: u32,
    /// How long the breaker stays open before a trial call
    pub timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            fail_max: 3,
            timeout: Duration::from_secs(60 * 60),
        }
    }
}

impl BreakerConfig {
    /// Postcode lookup provider
    pub fn postcodes() -> Self {
        Self::default()
    }

    /// Police neighbourhood provider
    pub fn police() -> Self {
        Self::default()
    }

    /// Geosearch provider for points of interest; quick to recover
    pub fn wikipedia() -> Self {
        Self::default()
            .with_fail_max(5)
            .with_timeout(Duration::from_secs(60))
    }

    /// Stolen bike register; it stays down for long stretches
    pub fn bike_register() -> Self {
        Self::default().with_timeout(Duration::from_secs(3 * 24 * 60 * 60))
    }

    pub fn with_fail_max(mut self, fail_max: u32) -> Self {
        self.fail_max = fail_max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        })
    }
}

/// Error from a breaker-guarded call
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BreakerError<E> {
    /// Rejected without running the call
    #[error("circuit open for {upstream}")]
    Open { upstream: String },

    /// The call ran and failed
    #[error("{0}")]
    Inner(E),
}

#[derive(Debug, Clone, Copy)]
enum State {
    Closed,
    Open { opened_at: DateTime<Utc> },
    // opened_at is kept so an abandoned trial can go back to Open unchanged
    HalfOpen { opened_at: DateTime<Utc> },
}

#[derive(Debug)]
struct Inner {
    state: State,
    failures: u32,
}

enum Admission {
    Pass,
    Trial,
    Reject,
}

/// Circuit breaker shared by every call to one upstream
///
/// Cloning creates a new handle to the SAME breaker state.
#[derive(Clone)]
pub struct CircuitBreaker {
    upstream: Arc<str>,
    inner: Arc<Mutex<Inner>>,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("upstream", &self.upstream)
            .field("state", &self.state())
            .field("failures", &self.failure_count())
            .field("config", &self.config)
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(upstream: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            upstream: Arc::from(upstream.into()),
            inner: Arc::new(Mutex::new(Inner {
                state: State::Closed,
                failures: 0,
            })),
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a specific time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn state(&self) -> BreakerState {
        match self.inner.lock().state {
            State::Closed => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// Consecutive failures counted so far
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failures
    }

    /// Force the breaker closed
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = State::Closed;
        inner.failures = 0;
    }

    /// Run `f` through the breaker; every `Err` counts as a failure
    pub async fn call<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(f, |_| true).await
    }

    /// Run `f` through the breaker; only errors `is_failure` accepts count
    ///
    /// An error the classifier rejects still proves the upstream answered,
    /// so it is treated like a success for state purposes.
    pub async fn call_classified<T, E, F, Fut, C>(
        &self,
        f: F,
        is_failure: C,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&E) -> bool,
    {
        let trial = match self.admit() {
            Admission::Pass => false,
            Admission::Trial => true,
            Admission::Reject => {
                return Err(BreakerError::Open {
                    upstream: self.upstream.to_string(),
                });
            }
        };

        let mut guard = TrialGuard {
            breaker: self,
            armed: trial,
        };
        let result = f().await;
        guard.armed = false;

        match &result {
            Err(e) if is_failure(e) => self.on_failure(trial),
            _ => self.on_success(trial),
        }

        result.map_err(BreakerError::Inner)
    }

    /// Decide whether a call may run; claims the trial slot atomically
    fn admit(&self) -> Admission {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let state = inner.state;
        match state {
            State::Closed => Admission::Pass,
            State::Open { opened_at } => {
                let elapsed = (now - opened_at).to_std().unwrap_or_default();
                if elapsed >= self.config.timeout {
                    inner.state = State::HalfOpen { opened_at };
                    tracing::debug!(
                        target: "hyperion",
                        upstream = %self.upstream,
                        "Circuit half-open, sending trial call"
                    );
                    Admission::Trial
                } else {
                    Admission::Reject
                }
            }
            State::HalfOpen { .. } => Admission::Reject,
        }
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        let state = inner.state;
        match state {
            State::Closed => inner.failures = 0,
            State::HalfOpen { .. } if trial => {
                inner.state = State::Closed;
                inner.failures = 0;
                tracing::info!(
                    target: "hyperion",
                    upstream = %self.upstream,
                    "Circuit closed, upstream recovered"
                );
            }
            // a call admitted before the trip finished late
            _ => {}
        }
    }

    fn on_failure(&self, trial: bool) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let state = inner.state;
        match state {
            State::Closed => {
                inner.failures += 1;
                if inner.failures >= self.config.fail_max.max(1) {
                    inner.state = State::Open { opened_at: now };
                    tracing::warn!(
                        target: "hyperion",
                        upstream = %self.upstream,
                        failures = inner.failures,
                        timeout_secs = self.config.timeout.as_secs(),
                        "Circuit opened"
                    );
                }
            }
            State::HalfOpen { .. } if trial => {
                inner.failures += 1;
                inner.state = State::Open { opened_at: now };
                tracing::warn!(
                    target: "hyperion",
                    upstream = %self.upstream,
                    "Trial call failed, circuit re-opened"
                );
            }
            _ => {}
        }
    }

    fn release_trial(&self) {
        let mut inner = self.inner.lock();
        if let State::HalfOpen { opened_at } = inner.state {
            inner.state = State::Open { opened_at };
            tracing::debug!(
                target: "hyperion",
                upstream = %self.upstream,
                "Trial call dropped, circuit back to open"
            );
        }
    }
}

/// Gives the trial slot back if the trial future is dropped mid-call
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.release_trial();
        }
    }
}
