//! Per-service usage accounting.

use crate::resilience::RateLimitStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Usage snapshot for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Completed upstream attempts (retries included)
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Calls short-circuited by an open breaker; not part of `total_requests`
    pub rejected_requests: u64,
    pub average_response_time_ms: f64,
    pub total_resource_used: u64,
    pub rate_limit_status: RateLimitStatus,
}

impl UsageStats {
    /// Fraction of completed attempts that succeeded, `None` before any.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_requests == 0 {
            None
        } else {
            Some(self.successful_requests as f64 / self.total_requests as f64)
        }
    }
}

/// Mutable counters behind the per-service usage lock.
#[derive(Debug, Clone, Default)]
pub(crate) struct UsageCounters {
    total: u64,
    successful: u64,
    failed: u64,
    rejected: u64,
    total_response_time_ms: f64,
    resource_used: u64,
}

impl UsageCounters {
    pub(crate) fn record(&mut self, success: bool, latency: Duration, resource_used: u64) {
        self.total += 1;
        if success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.total_response_time_ms += latency.as_secs_f64() * 1000.0;
        self.resource_used = self.resource_used.saturating_add(resource_used);
    }

    pub(crate) fn record_rejection(&mut self) {
        self.rejected += 1;
    }

    pub(crate) fn snapshot(&self, rate_limit_status: RateLimitStatus) -> UsageStats {
        let average_response_time_ms = if self.total == 0 {
            0.0
        } else {
            self.total_response_time_ms / self.total as f64
        };
        UsageStats {
            total_requests: self.total,
            successful_requests: self.successful,
            failed_requests: self.failed,
            rejected_requests: self.rejected,
            average_response_time_ms,
            total_resource_used: self.resource_used,
            rate_limit_status,
        }
    }
}
