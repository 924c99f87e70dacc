//! Unit tests for health module.

use super::*;
use crate::provider::{Provider, ProviderError, ProviderRequest, ProviderResponse};
use crate::registry::{HealthStatus, ServiceId, ServiceSettings};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

struct ToggleProvider {
    id: String,
    healthy: AtomicBool,
    probe_delay: Duration,
}

impl ToggleProvider {
    fn new(id: &str, healthy: bool) -> Self {
        Self {
            id: id.to_string(),
            healthy: AtomicBool::new(healthy),
            probe_delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl Provider for ToggleProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "toggle"
    }

    async fn invoke(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse::new(serde_json::Value::Null))
    }

    async fn is_healthy(&self) -> bool {
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        self.healthy.load(Ordering::SeqCst)
    }
}

fn registry_with(providers: Vec<Arc<ToggleProvider>>) -> Arc<ServiceRegistry> {
    let registry = Arc::new(ServiceRegistry::new());
    for provider in providers {
        let id = ServiceId::from(provider.id.as_str());
        registry
            .register(ServiceState::new(id, provider, ServiceSettings::default()))
            .unwrap();
    }
    registry
}

#[test]
fn test_config_default_values() {
    let config = HealthCheckConfig::default();
    assert!(config.enabled);
    assert_eq!(config.interval_seconds, 300);
    assert_eq!(config.timeout_seconds, 5);
    assert_eq!(config.failure_threshold, 3);
    assert_eq!(config.recovery_threshold, 2);
}

#[test]
fn test_config_partial_toml() {
    let config: HealthCheckConfig = toml::from_str("enabled = false").unwrap();
    assert!(!config.enabled);
    assert_eq!(config.interval(), Duration::from_secs(300));
}

#[test]
fn test_error_display() {
    assert_eq!(
        HealthCheckError::Timeout(5).to_string(),
        "probe timeout after 5s"
    );
}

#[test]
fn test_recovery_needs_threshold_successes() {
    let config = HealthCheckConfig::default();
    let mut state = ServiceHealthState::default();
    let fail = HealthCheckResult::Failure {
        error: HealthCheckError::Unhealthy,
    };
    let ok = HealthCheckResult::Success { latency_ms: 1 };

    assert_eq!(
        state.apply_result(&fail, &config),
        Some(HealthStatus::Unhealthy)
    );
    state.last_status = HealthStatus::Unhealthy;

    assert_eq!(state.apply_result(&ok, &config), None);
    assert_eq!(
        state.apply_result(&ok, &config),
        Some(HealthStatus::Healthy)
    );
    assert!(state.last_error.is_none());
    assert_eq!(state.last_latency_ms, Some(1));
}

#[tokio::test]
async fn test_check_all_updates_each_service() {
    let up = Arc::new(ToggleProvider::new("up", true));
    let down = Arc::new(ToggleProvider::new("down", false));
    let registry = registry_with(vec![up, down]);
    let monitor = HealthMonitor::new(Arc::clone(&registry), HealthCheckConfig::default());

    let results = monitor.check_all().await;
    assert_eq!(results.len(), 2);

    assert_eq!(
        registry.get("up").unwrap().health_status(),
        HealthStatus::Healthy
    );
    assert_eq!(
        registry.get("down").unwrap().health_status(),
        HealthStatus::Unhealthy
    );
    assert_eq!(
        registry.get("down").unwrap().health_state().last_error.as_deref(),
        Some("provider reported unhealthy")
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_probe_times_out() {
    let mut slow = ToggleProvider::new("slow", true);
    slow.probe_delay = Duration::from_secs(30);
    let registry = registry_with(vec![Arc::new(slow)]);
    let monitor = HealthMonitor::new(Arc::clone(&registry), HealthCheckConfig::default());

    let service = registry.get("slow").unwrap();
    let result = monitor.check_service(&service).await;
    assert_eq!(
        result,
        HealthCheckResult::Failure {
            error: HealthCheckError::Timeout(5)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_probe_does_not_block_state_access() {
    let mut slow = ToggleProvider::new("slow", true);
    slow.probe_delay = Duration::from_secs(2);
    let registry = registry_with(vec![Arc::new(slow)]);
    let monitor = Arc::new(HealthMonitor::new(
        Arc::clone(&registry),
        HealthCheckConfig::default(),
    ));

    let probe = {
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move { monitor.check_all().await })
    };
    tokio::task::yield_now().await;

    // Probe is in flight; per-service state stays reachable
    let service = registry.get("slow").unwrap();
    assert!(!service.is_circuit_open());
    service.record_attempt(true, Duration::from_millis(1), 0);
    assert_eq!(service.usage_stats().total_requests, 1);

    let results = probe.await.unwrap();
    assert!(results[0].1.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_monitor_stops_on_cancel() {
    let provider = Arc::new(ToggleProvider::new("svc", true));
    let registry = registry_with(vec![Arc::clone(&provider)]);
    let monitor = HealthMonitor::new(Arc::clone(&registry), HealthCheckConfig::default());

    let cancel = CancellationToken::new();
    let handle = monitor.start(cancel.clone());

    // First tick fires immediately
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(
        registry.get("svc").unwrap().health_status(),
        HealthStatus::Healthy
    );

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("monitor did not stop")
        .unwrap();
}
