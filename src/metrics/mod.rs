//! # Metrics Collection Module
//!
//! Prometheus export for `GET /metrics`.
//!
//! ## Metrics Tracked
//!
//! **Counters:**
//! - `augur_upstream_requests_total{service, outcome}` - Upstream attempts
//! - `augur_retries_total{service}` - Retries scheduled
//! - `augur_circuit_rejections_total{service}` - Calls refused by an open circuit
//! - `augur_fallback_attempts_total{strategy, outcome}` - Fallback strategy runs
//! - `augur_pipelines_total{outcome}` - Finished pipelines (`completed`/`degraded`)
//!
//! **Histograms:**
//! - `augur_upstream_duration_seconds{service}` - Per-attempt latency
//! - `augur_pipeline_duration_seconds` - Whole-pipeline latency
//!
//! **Gauges:**
//! - `augur_pipelines_in_flight` - Runs currently executing
//! - `augur_services_total` - Registered services
//! - `augur_services_available` - Services healthy with a non-open circuit
//! - `augur_circuit_state{service}` - 0 closed, 1 half-open, 2 open

pub mod handler;

pub use metrics_exporter_prometheus::PrometheusBuilder;

use crate::registry::ServiceRegistry;
use crate::resilience::CircuitState;
use std::sync::Arc;
use std::time::Instant;

/// Computes registry-derived gauges and renders the exporter output.
pub struct MetricsCollector {
    registry: Arc<ServiceRegistry>,
    start_time: Instant,
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl MetricsCollector {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        start_time: Instant,
        prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        Self {
            registry,
            start_time,
            prometheus_handle,
        }
    }

    /// Refresh service gauges from the registry.
    pub fn update_service_gauges(&self) {
        let services = self.registry.services();
        metrics::gauge!("augur_services_total").set(services.len() as f64);

        let available = services.iter().filter(|s| s.is_available()).count();
        metrics::gauge!("augur_services_available").set(available as f64);

        for service in &services {
            metrics::gauge!("augur_circuit_state", "service" => service.id().to_string())
                .set(circuit_state_value(service.circuit().state));
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Render Prometheus metrics in text format.
    pub fn render_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

fn circuit_state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}

/// Install the global Prometheus recorder with custom histogram buckets.
///
/// Upstream buckets cover fast cache-like responses up to the default
/// 30 s service timeout; pipeline buckets extend to several minutes.
pub fn setup_metrics(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let upstream_buckets = &[
        0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
    ];
    let pipeline_buckets = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("augur_upstream_duration_seconds".to_string()),
            upstream_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full("augur_pipeline_duration_seconds".to_string()),
            pipeline_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}
