//! Pipeline trace and result types.

use crate::classifier::ErrorInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Which action produced a trace step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// The stage's primary action
    Primary,
    /// The stage's own fallback action
    Fallback,
    /// A fallback-chain strategy
    Strategy,
    /// Synthesized degraded output
    Degraded,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepKind::Primary => "primary",
            StepKind::Fallback => "fallback",
            StepKind::Strategy => "strategy",
            StepKind::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

/// One attempted action. Appended to the trace and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStep {
    pub stage: String,
    pub kind: StepKind,
    /// Service id, or the strategy's pseudo-service (`cache`, `template`, ...)
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub resource_used: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// Captures start times for a step that is about to run.
#[derive(Debug, Clone, Copy)]
pub struct StepTimer {
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl StepTimer {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    fn finish(
        self,
        stage: &str,
        kind: StepKind,
        service: impl Into<String>,
        success: bool,
        resource_used: u64,
        error: Option<ErrorInfo>,
    ) -> ProcessingStep {
        let elapsed = self.clock.elapsed();
        let end_time = self.started_at
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        ProcessingStep {
            stage: stage.to_string(),
            kind,
            service: service.into(),
            strategy: None,
            start_time: self.started_at,
            end_time,
            duration_ms: elapsed.as_millis() as u64,
            success,
            resource_used,
            error,
        }
    }

    pub fn success(
        self,
        stage: &str,
        kind: StepKind,
        service: impl Into<String>,
        resource_used: u64,
    ) -> ProcessingStep {
        self.finish(stage, kind, service, true, resource_used, None)
    }

    pub fn failure(
        self,
        stage: &str,
        kind: StepKind,
        service: impl Into<String>,
        error: ErrorInfo,
    ) -> ProcessingStep {
        self.finish(stage, kind, service, false, 0, Some(error))
    }
}

impl ProcessingStep {
    pub fn with_strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy = Some(name.into());
        self
    }
}

/// Aggregate facts about one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub total_duration_ms: u64,
    pub total_resource_used: u64,
    /// Registered services that were called, in first-call order
    pub services_used: Vec<String>,
    pub confidence_score: f64,
    pub degraded: bool,
}

/// Outcome of one pipeline run. Always carries usable output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub request_id: String,
    /// The run completed and `output` is usable; see `metadata.degraded`
    pub success: bool,
    pub output: serde_json::Value,
    pub trace: Vec<ProcessingStep>,
    pub metadata: PipelineMetadata,
}

impl PipelineResult {
    pub fn is_degraded(&self) -> bool {
        self.metadata.degraded
    }

    /// Steps belonging to one stage, in execution order.
    pub fn stage_steps<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a ProcessingStep> {
        self.trace.iter().filter(move |s| s.stage == stage)
    }
}

/// Successful steps over all steps; 0.0 for an empty trace.
pub fn confidence_score(trace: &[ProcessingStep]) -> f64 {
    if trace.is_empty() {
        return 0.0;
    }
    let successes = trace.iter().filter(|s| s.success).count();
    successes as f64 / trace.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ErrorType, Severity};

    #[test]
    fn test_confidence_score() {
        let ok = StepTimer::start().success("a", StepKind::Primary, "svc", 1);
        let failed = StepTimer::start().failure(
            "a",
            StepKind::Primary,
            "svc",
            ErrorInfo::new(ErrorType::Network, Severity::Low, "down"),
        );
        assert_eq!(confidence_score(&[]), 0.0);
        assert_eq!(confidence_score(&[ok.clone()]), 1.0);
        let score = confidence_score(&[failed, ok.clone(), ok]);
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_step_serialization() {
        let step = StepTimer::start()
            .success("outline", StepKind::Strategy, "cache", 0)
            .with_strategy("cached");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["kind"], "strategy");
        assert_eq!(json["strategy"], "cached");
        assert!(json.get("error").is_none());
        assert!(step.end_time >= step.start_time);
    }
}
