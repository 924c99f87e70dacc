//! Pipeline orchestration.
//!
//! [`PipelineOrchestrator::run`] executes stages in order. Each stage tries
//! its primary action, then its own fallback action, then the fallback
//! chain, and finally synthesizes a degraded output. A run therefore always
//! produces a result; only malformed requests are rejected up front.

mod error;
pub mod history;
pub mod stage;
pub mod types;


pub use error::PipelineError;
pub use history::{RunHistory, RunSummary};
pub use stage::{PipelineStage, StageAction};
pub use types::{
    confidence_score, PipelineMetadata, PipelineResult, ProcessingStep, StepKind, StepTimer,
};

use crate::classifier::ErrorInfo;
use crate::config::PipelineConfig;
use crate::fallback::{
    default_strategies, FallbackChain, FallbackStrategy, RecoveryContext, RecoveryOutcome,
    ResponseCache,
};
use crate::health::{HealthCheckConfig, HealthMonitor};
use crate::provider::{ProviderRequest, ProviderResponse};
use crate::registry::{HealthStatus, ServiceId, ServiceRegistry, UsageStats};
use crate::resilience::{
    CircuitSnapshot, RateLimitStatus, RequestScope, RetryConfig, RetryingClient,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Status of one service in a [`SystemStatus`] snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceReport {
    pub id: ServiceId,
    pub provider: String,
    pub health: HealthStatus,
    /// Advisory: not known-unhealthy and circuit not open
    pub available: bool,
    pub circuit: CircuitSnapshot,
    pub rate_limit: RateLimitStatus,
    pub usage: UsageStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_error: Option<String>,
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub services: Vec<ServiceReport>,
    /// Pipeline runs currently in flight
    pub queue_depth: usize,
    pub accepting_requests: bool,
    pub history_len: usize,
    pub generated_at: DateTime<Utc>,
}

impl SystemStatus {
    pub fn available_services(&self) -> usize {
        self.services.iter().filter(|s| s.available).count()
    }
}

/// Output of one stage after all recovery options.
struct StageOutcome {
    content: serde_json::Value,
    degraded: bool,
}

/// Decrements the in-flight count when a run finishes, however it finishes.
struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
    drained: &'a Notify,
}

impl<'a> InFlightGuard<'a> {
    fn enter(in_flight: &'a AtomicUsize, drained: &'a Notify) -> Self {
        let depth = in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::gauge!("augur_pipelines_in_flight").set(depth as f64);
        Self { in_flight, drained }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let remaining = self.in_flight.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics::gauge!("augur_pipelines_in_flight").set(remaining as f64);
        if remaining == 0 {
            self.drained.notify_waiters();
        }
    }
}

/// Builder for [`PipelineOrchestrator`].
pub struct OrchestratorBuilder {
    registry: Arc<ServiceRegistry>,
    retry: RetryConfig,
    strategies: Option<Vec<FallbackStrategy>>,
    pipeline: PipelineConfig,
}

impl OrchestratorBuilder {
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Replace the fallback table. An empty table disables the chain.
    pub fn strategies(mut self, strategies: Vec<FallbackStrategy>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    /// Add one strategy to the table.
    pub fn strategy(mut self, strategy: FallbackStrategy) -> Self {
        self.strategies.get_or_insert_with(Vec::new).push(strategy);
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline = config;
        self
    }

    pub fn build(self) -> PipelineOrchestrator {
        let client = Arc::new(RetryingClient::new(Arc::clone(&self.registry), self.retry));
        let cache = Arc::new(ResponseCache::with_capacity(self.pipeline.cache_capacity));
        let strategies = self.strategies.unwrap_or_else(default_strategies);
        let chain = FallbackChain::new(strategies, Arc::clone(&client), Arc::clone(&cache));

        PipelineOrchestrator {
            history: RunHistory::new(self.pipeline.history_capacity),
            registry: self.registry,
            client,
            chain,
            cache,
            config: self.pipeline,
            in_flight: AtomicUsize::new(0),
            drained: Notify::new(),
            closed: AtomicBool::new(false),
            requests_cancel: CancellationToken::new(),
            health_cancel: CancellationToken::new(),
            health_task: Mutex::new(None),
        }
    }
}

/// Runs staged pipelines against the registered services.
pub struct PipelineOrchestrator {
    registry: Arc<ServiceRegistry>,
    client: Arc<RetryingClient>,
    chain: FallbackChain,
    cache: Arc<ResponseCache>,
    history: RunHistory,
    config: PipelineConfig,
    in_flight: AtomicUsize,
    drained: Notify,
    closed: AtomicBool,
    requests_cancel: CancellationToken,
    health_cancel: CancellationToken,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl PipelineOrchestrator {
    pub fn builder(registry: Arc<ServiceRegistry>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            registry,
            retry: RetryConfig::default(),
            strategies: None,
            pipeline: PipelineConfig::default(),
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn client(&self) -> &Arc<RetryingClient> {
        &self.client
    }

    pub fn fallback_chain(&self) -> &FallbackChain {
        &self.chain
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn queue_depth(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_accepting(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Fresh request scope, cancelled if shutdown gives up draining.
    pub fn new_scope(&self) -> RequestScope {
        RequestScope::new(self.requests_cancel.child_token())
    }

    /// Run a pipeline with no deadline.
    pub async fn run(&self, stages: &[PipelineStage]) -> Result<PipelineResult, PipelineError> {
        self.run_with(stages, self.new_scope()).await
    }

    /// Run a pipeline under the given cancellation scope.
    ///
    /// # Errors
    ///
    /// Only for misuse: empty stage list, unnamed stage, unknown service, or
    /// a shut-down orchestrator. Upstream failures never surface here.
    pub async fn run_with(
        &self,
        stages: &[PipelineStage],
        scope: RequestScope,
    ) -> Result<PipelineResult, PipelineError> {
        if !self.is_accepting() {
            return Err(PipelineError::ShuttingDown);
        }
        self.validate(stages)?;

        let _guard = InFlightGuard::enter(&self.in_flight, &self.drained);
        // Shutdown may have started between the first check and the increment
        if !self.is_accepting() {
            return Err(PipelineError::ShuttingDown);
        }

        let request_id = crate::logging::generate_request_id();
        let span = tracing::info_span!("pipeline", request_id = %request_id);

        let result = self
            .execute(request_id, stages, &scope)
            .instrument(span)
            .await;
        Ok(result)
    }

    fn validate(&self, stages: &[PipelineStage]) -> Result<(), PipelineError> {
        if stages.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }
        for (index, stage) in stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                return Err(PipelineError::UnnamedStage { index });
            }
            if let Some(service) = stage.services().find(|s| !self.registry.contains(s.as_str())) {
                return Err(PipelineError::UnknownService {
                    stage: stage.name.clone(),
                    service: service.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        request_id: String,
        stages: &[PipelineStage],
        scope: &RequestScope,
    ) -> PipelineResult {
        let started = Instant::now();
        let mut trace = Vec::new();
        let mut degraded = false;
        let mut previous: Option<serde_json::Value> = None;

        tracing::info!(stages = stages.len(), "Pipeline started");

        for stage in stages {
            let outcome = self
                .run_stage(stage, previous.take(), scope, &mut trace)
                .await;
            degraded |= outcome.degraded;
            previous = Some(outcome.content);
        }

        let output = previous.unwrap_or(serde_json::Value::Null);
        let metadata = PipelineMetadata {
            total_duration_ms: started.elapsed().as_millis() as u64,
            total_resource_used: trace.iter().map(|s| s.resource_used).sum(),
            services_used: self.services_used(&trace),
            confidence_score: confidence_score(&trace),
            degraded,
        };

        let result = PipelineResult {
            request_id,
            success: true,
            output,
            trace,
            metadata,
        };

        let outcome = if degraded { "degraded" } else { "success" };
        metrics::counter!("augur_pipelines_total", "outcome" => outcome).increment(1);
        metrics::histogram!("augur_pipeline_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        tracing::info!(
            duration_ms = result.metadata.total_duration_ms,
            steps = result.trace.len(),
            confidence = result.metadata.confidence_score,
            degraded,
            "Pipeline completed"
        );

        self.history
            .push(RunSummary::from_result(&result, stages.len()));
        result
    }

    async fn run_stage(
        &self,
        stage: &PipelineStage,
        input: Option<serde_json::Value>,
        scope: &RequestScope,
        trace: &mut Vec<ProcessingStep>,
    ) -> StageOutcome {
        let request = ProviderRequest::new(stage.name.clone(), stage.primary.payload.clone())
            .with_input(input);

        let mut last_error = match self
            .attempt(&stage.name, StepKind::Primary, &stage.primary.service, &request, scope, trace)
            .await
        {
            Ok(response) => return StageOutcome::completed(response.content),
            Err(error) => error,
        };

        if let Some(fallback) = &stage.fallback {
            tracing::info!(
                stage = %stage.name,
                service = %fallback.service,
                "Primary failed, trying stage fallback"
            );
            let fallback_request = ProviderRequest {
                payload: fallback.payload.clone(),
                ..request.clone()
            };
            match self
                .attempt(
                    &stage.name,
                    StepKind::Fallback,
                    &fallback.service,
                    &fallback_request,
                    scope,
                    trace,
                )
                .await
            {
                Ok(response) => return StageOutcome::completed(response.content),
                Err(error) => last_error = error,
            }
        }

        let recovery = self
            .chain
            .recover(
                &last_error,
                RecoveryContext {
                    stage: &stage.name,
                    request: &request,
                    scope,
                },
            )
            .await;
        trace.extend(recovery.steps);

        if let RecoveryOutcome::Recovered { response, .. } = recovery.outcome {
            return StageOutcome::completed(response.content);
        }

        tracing::warn!(
            stage = %stage.name,
            error_type = %last_error.error_type,
            error = %last_error.message,
            "All recovery options exhausted, degrading stage"
        );
        let timer = StepTimer::start();
        let content = json!({
            "degraded": true,
            "stage": stage.name,
            "message": self.config.degraded_message,
            "error": {
                "type": last_error.error_type,
                "message": last_error.message,
            },
        });
        trace.push(timer.failure(&stage.name, StepKind::Degraded, "degraded", last_error));

        StageOutcome {
            content,
            degraded: true,
        }
    }

    /// One stage action through the retrying client, traced.
    async fn attempt(
        &self,
        stage: &str,
        kind: StepKind,
        service: &ServiceId,
        request: &ProviderRequest,
        scope: &RequestScope,
        trace: &mut Vec<ProcessingStep>,
    ) -> Result<ProviderResponse, ErrorInfo> {
        let timer = StepTimer::start();
        match self.client.call(service.as_str(), request, scope).await {
            Ok(response) => {
                trace.push(timer.success(stage, kind, service.as_str(), response.resource_used));
                self.cache.store(stage, &response);
                Ok(response)
            }
            Err(error) => {
                trace.push(timer.failure(stage, kind, service.as_str(), error.clone()));
                Err(error)
            }
        }
    }

    fn services_used(&self, trace: &[ProcessingStep]) -> Vec<String> {
        let mut used: Vec<String> = Vec::new();
        for step in trace {
            if step.kind != StepKind::Degraded
                && self.registry.contains(&step.service)
                && !used.contains(&step.service)
            {
                used.push(step.service.clone());
            }
        }
        used
    }

    /// Health, breaker, rate-limit and usage for every service.
    pub fn system_status(&self) -> SystemStatus {
        let services = self
            .registry
            .services()
            .into_iter()
            .map(|s| {
                let health = s.health_state();
                ServiceReport {
                    id: s.id().clone(),
                    provider: s.provider().kind().to_string(),
                    health: health.last_status,
                    available: s.is_available(),
                    circuit: s.circuit(),
                    rate_limit: s.rate_limit_status(),
                    usage: s.usage_stats(),
                    last_health_check: health.last_check_time,
                    last_health_error: health.last_error,
                }
            })
            .collect();

        SystemStatus {
            services,
            queue_depth: self.queue_depth(),
            accepting_requests: self.is_accepting(),
            history_len: self.history.len(),
            generated_at: Utc::now(),
        }
    }

    /// Spawn the background health monitor. No-op when disabled or already
    /// running.
    pub fn start_health_monitor(&self, config: HealthCheckConfig) {
        if !config.enabled {
            tracing::info!("Health monitoring disabled");
            return;
        }
        if config.interval_seconds == 0 {
            tracing::warn!("Health check interval is zero, monitor not started");
            return;
        }
        let mut task = self
            .health_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }
        let monitor = HealthMonitor::new(Arc::clone(&self.registry), config);
        *task = Some(monitor.start(self.health_cancel.child_token()));
    }

    /// Stop accepting runs, drain in-flight runs, stop the health monitor and
    /// release providers. Idempotent.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(in_flight = self.queue_depth(), "Orchestrator shutting down");

        self.health_cancel.cancel();

        if !self.wait_for_drain(self.config.drain_timeout()).await {
            tracing::warn!(
                in_flight = self.queue_depth(),
                "Drain timeout elapsed, cancelling in-flight runs"
            );
            self.requests_cancel.cancel();
            self.wait_for_drain(Duration::from_secs(5)).await;
        }

        let task = self
            .health_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = task {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Health monitor task ended abnormally");
            }
        }

        for service in self.registry.services() {
            service.provider().cleanup().await;
        }
        tracing::info!("Orchestrator stopped");
    }

    /// Wait until no run is in flight. Returns `false` on timeout.
    async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.drained.notified();
            if self.queue_depth() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.queue_depth() == 0;
            }
        }
    }
}

impl StageOutcome {
    fn completed(content: serde_json::Value) -> Self {
        Self {
            content,
            degraded: false,
        }
    }
}
