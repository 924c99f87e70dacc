//! Retrying upstream client.
//!
//! Every call to a provider goes through [`RetryingClient::call`], which
//! applies the service's rate limit, circuit breaker, timeout and retry
//! policy, and keeps the service's usage counters current.

use super::{Admission, CircuitPermit, Interrupted, RequestScope};
use crate::classifier::{ErrorClassifier, ErrorContext, ErrorInfo};
use crate::provider::{ProviderError, ProviderRequest, ProviderResponse};
use crate::registry::{ServiceRegistry, ServiceState};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff configuration.
///
/// The retry budget itself is per service (`max_retries` in `[[services]]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay, doubled on every retry
    pub base_delay_ms: u64,
    /// Upper bound of the uniform random jitter added to each delay
    pub jitter_ms: u64,
    /// Cap on the exponential part of the delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            jitter_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter_ms = jitter.as_millis() as u64;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Deterministic part of the delay before retry number `attempt + 1`.
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// `base * 2^attempt + random(0, jitter)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        };
        self.exponential_delay(attempt) + Duration::from_millis(jitter)
    }
}

/// Resilient entry point for provider calls.
pub struct RetryingClient {
    registry: Arc<ServiceRegistry>,
    classifier: ErrorClassifier,
    config: RetryConfig,
}

impl RetryingClient {
    pub fn new(registry: Arc<ServiceRegistry>, config: RetryConfig) -> Self {
        Self {
            registry,
            classifier: ErrorClassifier::new(),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Call `service` with `request`, retrying transient failures.
    ///
    /// Returns the classified [`ErrorInfo`] of the last failure when the call
    /// cannot succeed. Caller cancellation (through `scope`) surfaces as a
    /// `Timeout` error and is not counted against the circuit breaker.
    pub async fn call(
        &self,
        service: &str,
        request: &ProviderRequest,
        scope: &RequestScope,
    ) -> Result<ProviderResponse, ErrorInfo> {
        let state = match self.registry.get(service) {
            Ok(state) => state,
            Err(e) => {
                let context = ErrorContext::default().with_stage(request.stage.clone());
                return Err(self
                    .classifier
                    .classify(&ProviderError::Configuration(e.to_string()), context));
            }
        };

        let context = || {
            ErrorContext::for_service(state.id())
                .with_stage(request.stage.clone())
                .with_max_retries(state.settings().max_retries)
        };

        let mut attempt: u32 = 0;
        let mut trial: Option<TrialGuard<'_>> = None;

        loop {
            if let Err(interrupted) = Self::admit(&state, scope).await {
                return Err(self.interrupted(&state, interrupted, attempt, context()));
            }

            if attempt == 0 {
                match state.check_circuit() {
                    CircuitPermit::Rejected => {
                        state.record_rejection();
                        return Err(self.classifier.circuit_open(context()));
                    }
                    CircuitPermit::Trial => trial = Some(TrialGuard::new(&state)),
                    CircuitPermit::Allowed => {}
                }
            }

            tracing::debug!(
                service = %state.id(),
                stage = %request.stage,
                attempt,
                "Invoking provider"
            );

            let started = Instant::now();
            let timeout = state.settings().timeout;
            let outcome = scope
                .run(tokio::time::timeout(
                    timeout,
                    state.provider().invoke(request.clone()),
                ))
                .await;
            let latency = started.elapsed();

            let result = match outcome {
                Err(interrupted) => {
                    return Err(self.interrupted(&state, interrupted, attempt, context()));
                }
                Ok(Err(_elapsed)) => Err(ProviderError::Timeout(timeout.as_millis() as u64)),
                Ok(Ok(result)) => result,
            };

            let service_label = state.id().to_string();
            metrics::histogram!("augur_upstream_duration_seconds", "service" => service_label.clone())
                .record(latency.as_secs_f64());

            match result {
                Ok(response) => {
                    state.record_attempt(true, latency, response.resource_used);
                    state.record_success();
                    TrialGuard::settle(&mut trial);
                    metrics::counter!("augur_upstream_requests_total",
                        "service" => service_label,
                        "outcome" => "success"
                    )
                    .increment(1);
                    return Ok(response);
                }
                Err(raw) => {
                    state.record_attempt(false, latency, 0);
                    metrics::counter!("augur_upstream_requests_total",
                        "service" => service_label.clone(),
                        "outcome" => "failure"
                    )
                    .increment(1);

                    let mut info = self.classifier.classify(&raw, context());
                    info.set_retry_attempts(attempt);

                    if !info.is_retryable() {
                        tracing::warn!(
                            service = %state.id(),
                            stage = %request.stage,
                            error_type = %info.error_type,
                            retry_attempts = attempt,
                            error = %info.message,
                            "Provider call failed"
                        );
                        state.record_failure();
                        TrialGuard::settle(&mut trial);
                        return Err(info);
                    }

                    let mut delay = self.config.backoff_delay(attempt);
                    if let Some(retry_after) = raw.retry_after() {
                        delay = delay.max(retry_after);
                    }

                    tracing::info!(
                        service = %state.id(),
                        stage = %request.stage,
                        attempt = attempt + 1,
                        max_retries = info.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %info.message,
                        "Retrying after transient error"
                    );
                    metrics::counter!("augur_retries_total", "service" => service_label)
                        .increment(1);

                    if let Err(interrupted) = scope.sleep(delay).await {
                        return Err(self.interrupted(&state, interrupted, attempt, context()));
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Wait until the service's rate window admits this attempt.
    async fn admit(state: &ServiceState, scope: &RequestScope) -> Result<(), Interrupted> {
        loop {
            if let Some(interrupted) = scope.interrupted() {
                return Err(interrupted);
            }
            match state.try_acquire() {
                Admission::Proceed => return Ok(()),
                Admission::Wait(wait) => {
                    tracing::debug!(
                        service = %state.id(),
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited, waiting for a slot"
                    );
                    scope.sleep(wait).await?;
                }
            }
        }
    }

    /// Turn a caller interruption into a `Timeout` error. Breaker untouched;
    /// a held trial is released when its guard drops.
    fn interrupted(
        &self,
        state: &ServiceState,
        interrupted: Interrupted,
        attempt: u32,
        context: ErrorContext,
    ) -> ErrorInfo {
        tracing::debug!(service = %state.id(), reason = %interrupted, "Provider call interrupted");

        let mut info = self
            .classifier
            .classify(&ProviderError::Cancelled(interrupted.to_string()), context);
        info.set_retry_attempts(attempt);
        info
    }
}

/// Half-open trial owned by an in-flight call.
///
/// Dropped without an upstream outcome (caller interruption, or the call
/// future itself being dropped), it hands the trial back to the breaker.
struct TrialGuard<'a> {
    state: &'a ServiceState,
    settled: bool,
}

impl<'a> TrialGuard<'a> {
    fn new(state: &'a ServiceState) -> Self {
        Self {
            state,
            settled: false,
        }
    }

    /// The breaker has recorded this call's outcome.
    fn settle(guard: &mut Option<Self>) {
        if let Some(mut guard) = guard.take() {
            guard.settled = true;
        }
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.state.abandon_trial();
            tracing::debug!(service = %self.state.id(), "Half-open trial released");
        }
    }
}
