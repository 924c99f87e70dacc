//! Fallback strategy table entries.
//!
//! Strategies are plain data: a match condition, an action and a priority.
//! They are loaded from `[[fallback.strategies]]` or built in code.
//!
//! ```toml
//! [[fallback.strategies]]
//! name = "secondary"
//! priority = 1
//! condition = { type = "error_types", types = ["timeout", "network"] }
//! action = { type = "secondary_provider", service = "backup" }
//! ```

use crate::classifier::{ErrorInfo, ErrorType, Severity};
use crate::registry::ServiceId;
use serde::{Deserialize, Serialize};

/// When a strategy applies to a failure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyCondition {
    #[default]
    Always,
    /// Failure type is one of these
    ErrorTypes { types: Vec<ErrorType> },
    /// Failure was classified recoverable
    Recoverable,
    /// Failure severity is at least this
    MinSeverity { severity: Severity },
}

impl StrategyCondition {
    pub fn matches(&self, error: &ErrorInfo) -> bool {
        match self {
            StrategyCondition::Always => true,
            StrategyCondition::ErrorTypes { types } => types.contains(&error.error_type),
            StrategyCondition::Recoverable => error.recoverable,
            StrategyCondition::MinSeverity { severity } => error.severity >= *severity,
        }
    }
}

/// What a strategy does to produce a stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyAction {
    /// Send the stage request to another registered service
    SecondaryProvider { service: ServiceId },
    /// Serve the last successful output recorded for the stage
    CachedResponse {
        #[serde(default = "default_max_age_ms")]
        max_age_ms: u64,
    },
    /// Render a template with `{stage}`, `{error}` and `{input}` placeholders
    TemplatedResponse { template: String },
    /// Emit fixed content
    StaticResponse { content: serde_json::Value },
}

fn default_max_age_ms() -> u64 {
    3_600_000
}

impl StrategyAction {
    /// Label recorded as the step's service in the trace.
    pub fn service_label(&self) -> &str {
        match self {
            StrategyAction::SecondaryProvider { service } => service.as_str(),
            StrategyAction::CachedResponse { .. } => "cache",
            StrategyAction::TemplatedResponse { .. } => "template",
            StrategyAction::StaticResponse { .. } => "static",
        }
    }
}

/// One entry of the fallback table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackStrategy {
    pub name: String,
    /// Lower runs first
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub condition: StrategyCondition,
    pub action: StrategyAction,
}

impl FallbackStrategy {
    pub fn new(name: impl Into<String>, priority: u32, action: StrategyAction) -> Self {
        Self {
            name: name.into(),
            priority,
            condition: StrategyCondition::Always,
            action,
        }
    }

    pub fn when(mut self, condition: StrategyCondition) -> Self {
        self.condition = condition;
        self
    }
}

/// Strategies used when configuration doesn't define any.
pub fn default_strategies() -> Vec<FallbackStrategy> {
    vec![
        FallbackStrategy::new(
            "cached",
            10,
            StrategyAction::CachedResponse {
                max_age_ms: default_max_age_ms(),
            },
        ),
        FallbackStrategy::new(
            "simplified",
            20,
            StrategyAction::TemplatedResponse {
                template: "Simplified {stage} result based on: {input}".to_string(),
            },
        )
        .when(StrategyCondition::Recoverable),
    ]
}

/// Fill template placeholders. `None` if `{input}` is used without input.
pub fn render_template(
    template: &str,
    stage: &str,
    error: &ErrorInfo,
    input: Option<&serde_json::Value>,
) -> Option<String> {
    let mut rendered = template
        .replace("{stage}", stage)
        .replace("{error}", &error.message);

    if rendered.contains("{input}") {
        let input = match input? {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rendered = rendered.replace("{input}", &input);
    }
    Some(rendered)
}
