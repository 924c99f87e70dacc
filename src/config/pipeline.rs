//! Pipeline orchestration configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[pipeline]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Message placed in synthesized output for a degraded stage
    pub degraded_message: String,
    /// Number of recent runs kept in the in-memory history
    pub history_capacity: usize,
    /// Number of stage names kept in the last-known-good response cache
    pub cache_capacity: usize,
    /// How long shutdown waits for in-flight runs before cancelling them
    pub drain_timeout_seconds: u64,
    /// Deadline applied to HTTP-submitted runs that don't set their own
    pub default_deadline_ms: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            degraded_message: "This step is temporarily unavailable; a minimal result was returned."
                .to_string(),
            history_capacity: 100,
            cache_capacity: crate::fallback::cache::DEFAULT_CAPACITY,
            drain_timeout_seconds: 30,
            default_deadline_ms: None,
        }
    }
}

impl PipelineConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_seconds)
    }
}
