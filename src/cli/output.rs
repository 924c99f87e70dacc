//! Output formatting helpers for CLI commands

use crate::config::AugurConfig;
use crate::health::HealthCheckResult;
use crate::pipeline::{PipelineResult, StepKind};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// View model for service display
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceView {
    pub id: String,
    pub provider: String,
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub rate_limit: String,
    pub circuit_breaker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeView>,
}

/// Outcome of `services --probe` for one service.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProbeView {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&HealthCheckResult> for ProbeView {
    fn from(result: &HealthCheckResult) -> Self {
        match result {
            HealthCheckResult::Success { latency_ms } => Self {
                healthy: true,
                latency_ms: Some(*latency_ms),
                error: None,
            },
            HealthCheckResult::Failure { error } => Self {
                healthy: false,
                latency_ms: None,
                error: Some(error.to_string()),
            },
        }
    }
}

/// Effective per-service settings, defaults merged in.
pub fn service_views(config: &AugurConfig) -> Vec<ServiceView> {
    config
        .services
        .iter()
        .map(|s| {
            let limits = s.rate_limit(&config.rate_limit);
            let breaker = s.circuit_breaker(&config.circuit_breaker);
            ServiceView {
                id: s.id.clone(),
                provider: s.kind.to_string(),
                endpoint: s
                    .base_url
                    .as_ref()
                    .map(|base| format!("{}{}", base.trim_end_matches('/'), s.invoke_path)),
                timeout_ms: s.timeout_ms,
                max_retries: s.max_retries,
                rate_limit: format!("{}/{}ms", limits.limit, limits.window_ms),
                circuit_breaker: format!(
                    "{} failures, reset {}ms",
                    breaker.failure_threshold, breaker.reset_timeout_ms
                ),
                probe: None,
            }
        })
        .collect()
}

/// Format services as a table
pub fn format_services_table(services: &[ServiceView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let probed = services.iter().any(|s| s.probe.is_some());
    let mut header = vec![
        "Service",
        "Provider",
        "Endpoint",
        "Timeout",
        "Retries",
        "Rate Limit",
        "Circuit Breaker",
    ];
    if probed {
        header.push("Probe");
    }
    table.set_header(header);

    for s in services {
        let mut row = vec![
            Cell::new(&s.id),
            Cell::new(&s.provider),
            Cell::new(s.endpoint.as_deref().unwrap_or("-")),
            Cell::new(format!("{}ms", s.timeout_ms)),
            Cell::new(s.max_retries),
            Cell::new(&s.rate_limit),
            Cell::new(&s.circuit_breaker),
        ];
        if probed {
            row.push(Cell::new(probe_label(s.probe.as_ref())));
        }
        table.add_row(row);
    }

    table.to_string()
}

fn probe_label(probe: Option<&ProbeView>) -> String {
    match probe {
        Some(ProbeView {
            healthy: true,
            latency_ms,
            ..
        }) => format!("{} {}ms", "✓".green(), latency_ms.unwrap_or(0)),
        Some(ProbeView {
            error: Some(error), ..
        }) => format!("{} {}", "✗".red(), error),
        Some(_) => "✗".red().to_string(),
        None => "-".to_string(),
    }
}

/// Format services as JSON
pub fn format_services_json(services: &[ServiceView]) -> String {
    serde_json::to_string_pretty(&json!({ "services": services }))
        .unwrap_or_else(|_| "{}".to_string())
}

/// Format a pipeline result as a summary plus a trace table.
pub fn format_result_table(result: &PipelineResult) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Stage", "Step", "Service", "Status", "Duration", "Resource", "Error",
    ]);

    for step in &result.trace {
        let kind = match (&step.kind, &step.strategy) {
            (StepKind::Strategy, Some(name)) => format!("strategy:{}", name),
            (kind, _) => kind.to_string(),
        };
        let status = if step.success {
            "ok".green().to_string()
        } else if step.kind == StepKind::Degraded {
            "degraded".yellow().to_string()
        } else {
            "failed".red().to_string()
        };
        table.add_row(vec![
            Cell::new(&step.stage),
            Cell::new(kind),
            Cell::new(&step.service),
            Cell::new(status),
            Cell::new(format!("{}ms", step.duration_ms)),
            Cell::new(step.resource_used),
            Cell::new(
                step.error
                    .as_ref()
                    .map(|e| format!("{}: {}", e.error_type, e.message))
                    .unwrap_or_default(),
            ),
        ]);
    }

    let outcome = if result.metadata.degraded {
        "Degraded".yellow()
    } else {
        "Completed".green()
    };
    let output = serde_json::to_string_pretty(&result.output).unwrap_or_default();

    format!(
        "Request: {}\nOutcome: {}\nConfidence: {:.2}\nDuration: {}ms\nResource used: {}\nServices: {}\n\n{}\n\nOutput:\n{}",
        result.request_id,
        outcome,
        result.metadata.confidence_score,
        result.metadata.total_duration_ms,
        result.metadata.total_resource_used,
        if result.metadata.services_used.is_empty() {
            "-".to_string()
        } else {
            result.metadata.services_used.join(", ")
        },
        table,
        output
    )
}

/// Format a pipeline result as JSON
pub fn format_result_json(result: &PipelineResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
}
