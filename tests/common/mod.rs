//! Shared test utilities for Augur integration tests.
//!
//! Scripted providers and registry/orchestrator builders.

#![allow(dead_code)]

use async_trait::async_trait;
use augur::pipeline::{PipelineOrchestrator, PipelineStage, StageAction};
use augur::provider::{Provider, ProviderError, ProviderRequest, ProviderResponse};
use augur::registry::{ServiceId, ServiceRegistry, ServiceSettings, ServiceState};
use augur::resilience::{CircuitBreakerConfig, RateLimitConfig, RetryConfig};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Scripted Provider
// =============================================================================

pub type Outcome = Result<Value, ProviderError>;

/// Provider that replays a script of outcomes, then repeats the last one.
pub struct ScriptedProvider {
    id: String,
    script: Mutex<VecDeque<Outcome>>,
    last: Mutex<Option<Outcome>>,
    latency: Duration,
    healthy: AtomicBool,
    calls: AtomicU32,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(id: &str, script: Vec<Outcome>) -> Arc<Self> {
        Self::with_latency(id, script, Duration::ZERO)
    }

    pub fn with_latency(id: &str, script: Vec<Outcome>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            latency,
            healthy: AtomicBool::new(true),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn ok(id: &str, value: Value) -> Arc<Self> {
        Self::new(id, vec![Ok(value)])
    }

    pub fn failing(id: &str, error: ProviderError) -> Arc<Self> {
        Self::new(id, vec![Err(error)])
    }

    /// Fails `failures` times with a network error, then answers `value`.
    pub fn flaky(id: &str, failures: usize, value: Value) -> Arc<Self> {
        let mut script: Vec<Outcome> = (0..failures)
            .map(|_| Err(ProviderError::Network("connection reset".into())))
            .collect();
        script.push(Ok(value));
        Self::new(id, script)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "scripted"
    }

    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        let outcome = match next {
            Some(outcome) => {
                *self.last.lock().unwrap() = Some(outcome.clone());
                outcome
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(Ok(Value::Null)),
        };
        outcome.map(|content| ProviderResponse::new(content).with_resource_used(10))
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Settings with the given retry budget and otherwise default tiers.
pub fn settings(max_retries: u32) -> ServiceSettings {
    ServiceSettings {
        max_retries,
        ..ServiceSettings::default()
    }
}

pub fn settings_with(
    max_retries: u32,
    rate_limit: RateLimitConfig,
    circuit_breaker: CircuitBreakerConfig,
) -> ServiceSettings {
    ServiceSettings {
        max_retries,
        rate_limit,
        circuit_breaker,
        ..ServiceSettings::default()
    }
}

/// Register each provider under its own id.
pub fn registry_of(entries: Vec<(Arc<ScriptedProvider>, ServiceSettings)>) -> Arc<ServiceRegistry> {
    let registry = Arc::new(ServiceRegistry::new());
    for (provider, settings) in entries {
        let id = ServiceId::from(provider.id());
        registry
            .register(ServiceState::new(id, provider, settings))
            .unwrap();
    }
    registry
}

/// Backoff with no jitter so elapsed times are predictable.
pub fn retry_config(base_ms: u64) -> RetryConfig {
    RetryConfig::new()
        .base_delay(Duration::from_millis(base_ms))
        .jitter(Duration::ZERO)
}

pub fn orchestrator(registry: Arc<ServiceRegistry>) -> PipelineOrchestrator {
    PipelineOrchestrator::builder(registry)
        .retry(retry_config(1))
        .build()
}

pub fn stage(name: &str, primary: &str) -> PipelineStage {
    PipelineStage::new(name, StageAction::new(primary, json!({"stage": name})))
}
