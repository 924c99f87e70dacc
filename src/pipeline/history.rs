//! Run history ring buffer.
//!
//! Keeps summaries of the most recent pipeline runs in memory. Nothing is
//! persisted.

use super::types::PipelineResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
const MAX_ERROR_LEN: usize = 1024;

/// Summary of one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub request_id: String,
    pub completed_at: DateTime<Utc>,
    pub stages: usize,
    pub steps: usize,
    pub duration_ms: u64,
    pub degraded: bool,
    pub confidence_score: f64,
    pub services_used: Vec<String>,
    /// Message of the first failure in the trace, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}

impl RunSummary {
    pub fn from_result(result: &PipelineResult, stages: usize) -> Self {
        let first_error = result
            .trace
            .iter()
            .find_map(|s| s.error.as_ref())
            .map(|e| {
                let mut message = e.message.clone();
                if message.len() > MAX_ERROR_LEN {
                    let mut end = MAX_ERROR_LEN;
                    while !message.is_char_boundary(end) {
                        end -= 1;
                    }
                    message.truncate(end);
                }
                message
            });

        Self {
            request_id: result.request_id.clone(),
            completed_at: Utc::now(),
            stages,
            steps: result.trace.len(),
            duration_ms: result.metadata.total_duration_ms,
            degraded: result.metadata.degraded,
            confidence_score: result.metadata.confidence_score,
            services_used: result.metadata.services_used.clone(),
            first_error,
        }
    }
}

/// Bounded FIFO of run summaries.
pub struct RunHistory {
    entries: RwLock<VecDeque<RunSummary>>,
    capacity: usize,
}

impl RunHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Adds a summary, evicting the oldest if at capacity
    pub fn push(&self, summary: RunSummary) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(summary);
    }

    /// Returns all summaries in chronological order (oldest first)
    pub fn get_all(&self) -> Vec<RunSummary> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RunHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
