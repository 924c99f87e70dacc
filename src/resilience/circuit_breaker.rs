//! Failure-threshold circuit breaker.
//!
//! One breaker exists per service and is shared by every in-flight request
//! addressed to it. The breaker itself is a plain state machine; callers hold
//! it behind the per-service lock in [`crate::registry::ServiceState`], which
//! makes each transition linearizable.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are rejected without reaching the upstream.
    Open,
    /// One trial request has been let through to probe recovery.
    HalfOpen,
}

/// Circuit breaker configuration.
///
/// # Example
///
/// ```toml
/// [circuit_breaker]
/// failure_threshold = 5
/// reset_timeout_ms = 60000
/// monitoring_period_ms = 300000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures (within the monitoring period) that open the circuit
    pub failure_threshold: u32,
    /// Time an open circuit waits before permitting a trial call
    pub reset_timeout_ms: u64,
    /// Failures further apart than this restart the failure count
    pub monitoring_period_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
            monitoring_period_ms: 300_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn monitoring_period(&self) -> Duration {
        Duration::from_millis(self.monitoring_period_ms)
    }
}

/// Outcome of asking the breaker whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitPermit {
    /// Circuit is closed.
    Allowed,
    /// Circuit just moved to half-open; the caller owns the single trial call.
    Trial,
    /// Circuit is open (or a half-open trial is already in flight).
    Rejected,
}

impl CircuitPermit {
    pub fn is_rejected(self) -> bool {
        matches!(self, CircuitPermit::Rejected)
    }
}

/// Serializable view of a breaker for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    /// Number of times the circuit has opened since creation or last reset
    pub times_opened: u64,
}

/// Per-service circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    trial_in_flight: bool,
    /// When the current half-open trial was handed out
    trial_granted_at: Option<Instant>,
    times_opened: u64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            trial_in_flight: false,
            trial_granted_at: None,
            times_opened: 0,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn last_failure_time(&self) -> Option<Instant> {
        self.last_failure_time
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns `true` when calls must be short-circuited.
    ///
    /// This is the only time-dependent call: an open circuit whose reset
    /// timeout has elapsed moves to half-open and returns `false` exactly
    /// once, granting the caller the trial call.
    pub fn is_open(&mut self) -> bool {
        self.check_at(Instant::now()).is_rejected()
    }

    /// Same as [`is_open`](Self::is_open) with an explicit clock reading.
    pub fn is_open_at(&mut self, now: Instant) -> bool {
        self.check_at(now).is_rejected()
    }

    /// Ask for permission to call, distinguishing the half-open trial.
    pub fn check(&mut self) -> CircuitPermit {
        self.check_at(Instant::now())
    }

    pub fn check_at(&mut self, now: Instant) -> CircuitPermit {
        match self.state {
            CircuitState::Closed => CircuitPermit::Allowed,
            CircuitState::HalfOpen if self.trial_in_flight && !self.trial_is_stale(now) => {
                CircuitPermit::Rejected
            }
            CircuitState::HalfOpen => {
                // Previous trial was abandoned or never reported back
                self.grant_trial(now)
            }
            CircuitState::Open => {
                let cooled_down = self
                    .last_failure_time
                    .map(|last| now.saturating_duration_since(last) >= self.config.reset_timeout())
                    .unwrap_or(true);

                if cooled_down {
                    self.state = CircuitState::HalfOpen;
                    self.grant_trial(now)
                } else {
                    CircuitPermit::Rejected
                }
            }
        }
    }

    fn grant_trial(&mut self, now: Instant) -> CircuitPermit {
        self.trial_in_flight = true;
        self.trial_granted_at = Some(now);
        CircuitPermit::Trial
    }

    /// A trial outstanding for a full reset timeout is treated as lost.
    fn trial_is_stale(&self, now: Instant) -> bool {
        self.trial_granted_at.is_some_and(|granted| {
            now.saturating_duration_since(granted) >= self.config.reset_timeout()
        })
    }

    /// Record a successful terminal outcome: closes the circuit.
    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.state = CircuitState::Closed;
        self.trial_in_flight = false;
        self.trial_granted_at = None;
    }

    pub fn record_failure(&mut self) {
        self.record_failure_at(Instant::now());
    }

    /// Record a failed terminal outcome at the given instant.
    pub fn record_failure_at(&mut self, now: Instant) {
        if self.state == CircuitState::Closed {
            if let Some(last) = self.last_failure_time {
                if now.saturating_duration_since(last) > self.config.monitoring_period() {
                    self.failure_count = 0;
                }
            }
        }

        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_time = Some(now);

        match self.state {
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.trial_in_flight = false;
                self.trial_granted_at = None;
                self.times_opened += 1;
            }
            CircuitState::Closed if self.failure_count >= self.config.failure_threshold => {
                self.state = CircuitState::Open;
                self.times_opened += 1;
            }
            _ => {}
        }
    }

    /// Release a half-open trial whose call ended without an upstream
    /// outcome (caller cancellation). The next caller may probe instead.
    pub fn abandon_trial(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.trial_in_flight = false;
            self.trial_granted_at = None;
        }
    }

    /// Administrative reset to a fresh closed breaker.
    pub fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.last_failure_time = None;
        self.trial_in_flight = false;
        self.trial_granted_at = None;
        self.times_opened = 0;
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            state: self.state,
            failure_count: self.failure_count,
            times_opened: self.times_opened,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
