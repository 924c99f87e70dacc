//! Pipeline execution and inspection handlers.

use crate::api::{ApiError, AppState, PipelineRequest, ResetResponse};
use crate::pipeline::{PipelineResult, RunSummary, SystemStatus};
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use std::time::Duration;

/// POST /v1/pipelines - run a pipeline and return its result.
///
/// The run's deadline is the request's `deadline_ms`, else
/// `[pipeline].default_deadline_ms`, never beyond the server request timeout.
pub async fn run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PipelineRequest>,
) -> Result<Json<PipelineResult>, ApiError> {
    let server_limit = state.config.server.request_timeout();
    let deadline = request
        .deadline_ms
        .or(state.config.pipeline.default_deadline_ms)
        .map(Duration::from_millis)
        .map_or(server_limit, |d| d.min(server_limit));

    let scope = state.orchestrator.new_scope().with_timeout(deadline);
    let result = state.orchestrator.run_with(&request.stages, scope).await?;
    Ok(Json(result))
}

/// GET /v1/status - per-service health, breaker, rate-limit and usage.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    Json(state.orchestrator.system_status())
}

/// GET /v1/history - recent run summaries, oldest first.
pub async fn history(State(state): State<Arc<AppState>>) -> Json<Vec<RunSummary>> {
    Json(state.orchestrator.history().get_all())
}

/// POST /v1/services/:id/reset - clear a service's breaker, window and counters.
pub async fn reset_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    state.orchestrator.registry().reset(&id)?;
    tracing::info!(service = %id, "Service state reset via API");
    Ok(Json(ResetResponse {
        service: id,
        reset: true,
    }))
}
