//! Ordered fallback strategy chain.
//!
//! When a stage's own actions fail, the orchestrator asks the chain to
//! recover. Matching strategies run one at a time in ascending priority; the
//! first one that produces output wins. Every attempt is recorded as a trace
//! step whether it succeeds or not.

pub mod cache;
pub mod error;
pub mod strategy;

pub use cache::ResponseCache;
pub use error::FallbackError;
pub use strategy::{
    default_strategies, render_template, FallbackStrategy, StrategyAction, StrategyCondition,
};

use crate::classifier::ErrorInfo;
use crate::pipeline::{ProcessingStep, StepKind, StepTimer};
use crate::provider::{ProviderRequest, ProviderResponse};
use crate::resilience::{RequestScope, RetryingClient};
use std::sync::Arc;
use std::time::Duration;

/// What the failing stage was doing.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryContext<'a> {
    pub stage: &'a str,
    pub request: &'a ProviderRequest,
    pub scope: &'a RequestScope,
}

/// Result of a recovery attempt.
#[derive(Debug, Clone)]
pub enum RecoveryOutcome {
    Recovered {
        strategy: String,
        response: ProviderResponse,
    },
    /// No strategy matched, or every matching strategy failed
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct Recovery {
    pub outcome: RecoveryOutcome,
    /// One step per strategy attempted, in order
    pub steps: Vec<ProcessingStep>,
}

impl Recovery {
    pub fn is_exhausted(&self) -> bool {
        matches!(self.outcome, RecoveryOutcome::Exhausted)
    }
}

/// Priority-ordered table of fallback strategies.
pub struct FallbackChain {
    strategies: Vec<FallbackStrategy>,
    client: Arc<RetryingClient>,
    cache: Arc<ResponseCache>,
}

impl FallbackChain {
    /// Build the chain. Strategies are stably sorted by priority.
    pub fn new(
        mut strategies: Vec<FallbackStrategy>,
        client: Arc<RetryingClient>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        strategies.sort_by_key(|s| s.priority);
        Self {
            strategies,
            client,
            cache,
        }
    }

    pub fn strategies(&self) -> &[FallbackStrategy] {
        &self.strategies
    }

    /// Strategies whose condition matches `error`, in execution order.
    pub fn applicable<'a>(
        &'a self,
        error: &'a ErrorInfo,
    ) -> impl Iterator<Item = &'a FallbackStrategy> + 'a {
        self.strategies
            .iter()
            .filter(move |s| s.condition.matches(error))
    }

    /// Try each applicable strategy until one produces output.
    pub async fn recover(&self, error: &ErrorInfo, ctx: RecoveryContext<'_>) -> Recovery {
        let mut steps = Vec::new();

        for strategy in self.applicable(error) {
            let timer = StepTimer::start();
            let label = strategy.action.service_label().to_string();

            match self.execute(strategy, error, ctx).await {
                Ok(response) => {
                    tracing::info!(
                        stage = ctx.stage,
                        strategy = %strategy.name,
                        "Fallback strategy recovered stage"
                    );
                    metrics::counter!("augur_fallback_attempts_total",
                        "strategy" => strategy.name.clone(),
                        "outcome" => "success"
                    )
                    .increment(1);

                    steps.push(
                        timer
                            .success(ctx.stage, StepKind::Strategy, label, response.resource_used)
                            .with_strategy(&strategy.name),
                    );
                    return Recovery {
                        outcome: RecoveryOutcome::Recovered {
                            strategy: strategy.name.clone(),
                            response,
                        },
                        steps,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        stage = ctx.stage,
                        strategy = %strategy.name,
                        error = %e,
                        "Fallback strategy failed"
                    );
                    metrics::counter!("augur_fallback_attempts_total",
                        "strategy" => strategy.name.clone(),
                        "outcome" => "failure"
                    )
                    .increment(1);

                    steps.push(
                        timer
                            .failure(ctx.stage, StepKind::Strategy, label, e.into_error_info())
                            .with_strategy(&strategy.name),
                    );
                }
            }
        }

        if steps.is_empty() {
            tracing::debug!(
                stage = ctx.stage,
                error_type = %error.error_type,
                "No fallback strategy matched"
            );
        }

        Recovery {
            outcome: RecoveryOutcome::Exhausted,
            steps,
        }
    }

    async fn execute(
        &self,
        strategy: &FallbackStrategy,
        error: &ErrorInfo,
        ctx: RecoveryContext<'_>,
    ) -> Result<ProviderResponse, FallbackError> {
        match &strategy.action {
            StrategyAction::SecondaryProvider { service } => self
                .client
                .call(service.as_str(), ctx.request, ctx.scope)
                .await
                .map_err(FallbackError::Provider),
            StrategyAction::CachedResponse { max_age_ms } => self
                .cache
                .get(ctx.stage, Duration::from_millis(*max_age_ms))
                .ok_or_else(|| FallbackError::NoCachedResponse(ctx.stage.to_string())),
            StrategyAction::TemplatedResponse { template } => {
                render_template(template, ctx.stage, error, ctx.request.input.as_ref())
                    .map(|text| {
                        ProviderResponse::new(serde_json::json!({
                            "text": text,
                            "fallback": strategy.name,
                        }))
                    })
                    .ok_or_else(|| FallbackError::MissingInput(ctx.stage.to_string()))
            }
            StrategyAction::StaticResponse { content } => {
                Ok(ProviderResponse::new(content.clone()))
            }
        }
    }
}
