//! Per-service identity, settings and shared resilience state.

use super::usage::{UsageCounters, UsageStats};
use crate::config::ServiceConfig;
use crate::health::{HealthCheckConfig, HealthCheckResult, ServiceHealthState};
use crate::provider::Provider;
use crate::resilience::{
    Admission, CircuitBreaker, CircuitBreakerConfig, CircuitPermit, CircuitSnapshot,
    CircuitState, RateLimitConfig, RateLimitStatus, RateWindow,
};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Key for all per-service state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ServiceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Advisory health of a service, as seen by the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

/// Resolved, immutable call settings for one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSettings {
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    pub max_retries: u32,
    pub rate_limit: RateLimitConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl ServiceSettings {
    /// Merge a `[[services]]` entry with the global tiers.
    pub fn resolve(
        config: &ServiceConfig,
        rate_limit: &RateLimitConfig,
        circuit_breaker: &CircuitBreakerConfig,
    ) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            rate_limit: config.rate_limit(rate_limit),
            circuit_breaker: config.circuit_breaker(circuit_breaker),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            rate_limit: RateLimitConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Lock a per-service mutex, recovering the data if a holder panicked.
///
/// Critical sections here never leave state half-updated, so a poisoned
/// guard is still consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything the orchestrator shares about one upstream service.
///
/// Breaker, rate window, usage and health each sit behind their own mutex.
/// Locks are only held for the duration of a synchronous update, never
/// across an `.await`.
pub struct ServiceState {
    id: ServiceId,
    provider: Arc<dyn Provider>,
    settings: ServiceSettings,
    breaker: Mutex<CircuitBreaker>,
    window: Mutex<RateWindow>,
    usage: Mutex<UsageCounters>,
    health: Mutex<ServiceHealthState>,
}

impl fmt::Debug for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceState")
            .field("id", &self.id)
            .field("provider", &self.provider.kind())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ServiceState {
    pub fn new(id: ServiceId, provider: Arc<dyn Provider>, settings: ServiceSettings) -> Self {
        Self {
            breaker: Mutex::new(CircuitBreaker::new(settings.circuit_breaker.clone())),
            window: Mutex::new(RateWindow::new(settings.rate_limit.clone())),
            usage: Mutex::new(UsageCounters::default()),
            health: Mutex::new(ServiceHealthState::default()),
            id,
            provider,
            settings,
        }
    }

    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    // --- rate limiting -----------------------------------------------------

    pub fn try_acquire(&self) -> Admission {
        lock(&self.window).try_acquire()
    }

    pub fn rate_limit_status(&self) -> RateLimitStatus {
        lock(&self.window).usage()
    }

    // --- circuit breaking --------------------------------------------------

    /// Ask the breaker whether a call may go out.
    pub fn check_circuit(&self) -> CircuitPermit {
        let permit = lock(&self.breaker).check();
        match permit {
            CircuitPermit::Trial => {
                tracing::info!(service = %self.id, "Circuit half-open, permitting trial call");
            }
            CircuitPermit::Rejected => {
                tracing::debug!(service = %self.id, "Circuit open, rejecting call");
                metrics::counter!("augur_circuit_rejections_total", "service" => self.id.to_string())
                    .increment(1);
            }
            CircuitPermit::Allowed => {}
        }
        permit
    }

    pub fn is_circuit_open(&self) -> bool {
        self.check_circuit().is_rejected()
    }

    pub fn record_success(&self) {
        let previous = {
            let mut breaker = lock(&self.breaker);
            let previous = breaker.state();
            breaker.record_success();
            previous
        };
        if previous != CircuitState::Closed {
            tracing::info!(service = %self.id, "Circuit closed after successful trial");
        }
    }

    pub fn record_failure(&self) {
        let (previous, current, failures) = {
            let mut breaker = lock(&self.breaker);
            let previous = breaker.state();
            breaker.record_failure();
            (previous, breaker.state(), breaker.failure_count())
        };
        if current == CircuitState::Open && previous != CircuitState::Open {
            tracing::warn!(
                service = %self.id,
                failure_count = failures,
                from = ?previous,
                "Circuit opened"
            );
        }
    }

    pub fn abandon_trial(&self) {
        lock(&self.breaker).abandon_trial();
    }

    pub fn circuit(&self) -> CircuitSnapshot {
        lock(&self.breaker).snapshot()
    }

    // --- usage -------------------------------------------------------------

    /// Account one completed upstream attempt.
    pub fn record_attempt(&self, success: bool, latency: Duration, resource_used: u64) {
        lock(&self.usage).record(success, latency, resource_used);
    }

    /// Account one call rejected by the circuit breaker.
    pub fn record_rejection(&self) {
        lock(&self.usage).record_rejection();
    }

    pub fn usage_stats(&self) -> UsageStats {
        let counters = lock(&self.usage).clone();
        counters.snapshot(self.rate_limit_status())
    }

    // --- health ------------------------------------------------------------

    pub fn health_status(&self) -> HealthStatus {
        lock(&self.health).last_status
    }

    pub fn health_state(&self) -> ServiceHealthState {
        lock(&self.health).clone()
    }

    /// Write a probe result back. Returns the new status on a transition.
    pub fn apply_probe(
        &self,
        result: &HealthCheckResult,
        config: &HealthCheckConfig,
    ) -> Option<HealthStatus> {
        let mut health = lock(&self.health);
        let transition = health.apply_result(result, config);
        if let Some(status) = transition {
            health.last_status = status;
        }
        transition
    }

    /// Advisory availability: not known-unhealthy and circuit not open.
    pub fn is_available(&self) -> bool {
        self.health_status() != HealthStatus::Unhealthy
            && self.circuit().state != CircuitState::Open
    }

    /// Administrative reset of breaker, window, usage and health.
    pub fn reset(&self) {
        lock(&self.breaker).reset();
        lock(&self.window).clear();
        *lock(&self.usage) = UsageCounters::default();
        *lock(&self.health) = ServiceHealthState::default();
        tracing::info!(service = %self.id, "Service state reset");
    }
}
