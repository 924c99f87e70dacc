//! Per-service health state tracking.

use super::config::HealthCheckConfig;
use super::error::HealthCheckError;
use crate::registry::HealthStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Tracks health check state for a single service.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceHealthState {
    /// Count of consecutive failed checks
    pub consecutive_failures: u32,
    /// Count of consecutive successful checks
    pub consecutive_successes: u32,
    /// When last check completed
    pub last_check_time: Option<DateTime<Utc>>,
    /// Last known status (for detecting transitions)
    pub last_status: HealthStatus,
    /// Latency of the last successful probe
    pub last_latency_ms: Option<u32>,
    /// Error from the last failed probe
    pub last_error: Option<String>,
}

/// Result of a health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthCheckResult {
    Success { latency_ms: u32 },
    Failure { error: HealthCheckError },
}

impl HealthCheckResult {
    pub fn is_success(&self) -> bool {
        matches!(self, HealthCheckResult::Success { .. })
    }
}

impl ServiceHealthState {
    /// Apply a health check result and determine if status should transition.
    /// Returns Some(new_status) if transition should occur, None otherwise.
    pub fn apply_result(
        &mut self,
        result: &HealthCheckResult,
        config: &HealthCheckConfig,
    ) -> Option<HealthStatus> {
        self.last_check_time = Some(Utc::now());

        match result {
            HealthCheckResult::Success { latency_ms } => {
                self.consecutive_failures = 0;
                self.consecutive_successes += 1;
                self.last_latency_ms = Some(*latency_ms);
                self.last_error = None;

                match self.last_status {
                    HealthStatus::Unknown => Some(HealthStatus::Healthy),
                    HealthStatus::Unhealthy
                        if self.consecutive_successes >= config.recovery_threshold =>
                    {
                        Some(HealthStatus::Healthy)
                    }
                    _ => None,
                }
            }
            HealthCheckResult::Failure { error } => {
                self.consecutive_successes = 0;
                self.consecutive_failures += 1;
                self.last_error = Some(error.to_string());

                match self.last_status {
                    HealthStatus::Unknown => Some(HealthStatus::Unhealthy),
                    HealthStatus::Healthy
                        if self.consecutive_failures >= config.failure_threshold =>
                    {
                        Some(HealthStatus::Unhealthy)
                    }
                    _ => None,
                }
            }
        }
    }
}
