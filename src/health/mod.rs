//! Background health monitoring for upstream providers.
//!
//! Probes every registered service on a fixed interval. Probes run outside
//! any per-service lock; only the outcome is written back under the lock, so
//! a slow probe never blocks request traffic.

mod config;
mod error;
mod state;

#[cfg(test)]
mod tests;

pub use config::*;
pub use error::*;
pub use state::*;

use crate::registry::{ServiceRegistry, ServiceState};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Background service that periodically probes provider health.
pub struct HealthMonitor {
    registry: Arc<ServiceRegistry>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ServiceRegistry>, config: HealthCheckConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// Probe a single service. Holds no lock while the probe runs.
    pub async fn check_service(&self, service: &ServiceState) -> HealthCheckResult {
        let start = Instant::now();

        match tokio::time::timeout(self.config.timeout(), service.provider().is_healthy()).await {
            Ok(true) => {
                let latency_ms = start.elapsed().as_millis() as u32;
                HealthCheckResult::Success { latency_ms }
            }
            Ok(false) => HealthCheckResult::Failure {
                error: HealthCheckError::Unhealthy,
            },
            Err(_) => HealthCheckResult::Failure {
                error: HealthCheckError::Timeout(self.config.timeout_seconds),
            },
        }
    }

    /// Write a probe result back under the service's health lock.
    pub fn apply_result(&self, service: &ServiceState, result: &HealthCheckResult) {
        if let Some(status) = service.apply_probe(result, &self.config) {
            match result {
                HealthCheckResult::Failure { error } => tracing::warn!(
                    service = %service.id(),
                    new_status = ?status,
                    error = %error,
                    "Service health changed"
                ),
                HealthCheckResult::Success { latency_ms } => tracing::info!(
                    service = %service.id(),
                    new_status = ?status,
                    latency_ms,
                    "Service health changed"
                ),
            }
        }
    }

    /// Probe all registered services once, concurrently.
    pub async fn check_all(&self) -> Vec<(String, HealthCheckResult)> {
        let services = self.registry.services();
        let probes = services.iter().map(|s| self.check_service(s));
        let results = join_all(probes).await;

        services
            .iter()
            .zip(results)
            .map(|(service, result)| {
                self.apply_result(service, &result);
                (service.id().to_string(), result)
            })
            .collect()
    }

    /// Start the health monitor background task.
    /// Returns a JoinHandle that resolves when the monitor stops.
    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval_seconds = self.config.interval_seconds,
                "Health monitor started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Health monitor shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let results = self.check_all().await;
                        tracing::debug!(
                            services_checked = results.len(),
                            healthy = results.iter().filter(|(_, r)| r.is_success()).count(),
                            "Health check cycle completed"
                        );
                    }
                }
            }
        })
    }
}
