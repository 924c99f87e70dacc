//! # HTTP API
//!
//! JSON endpoints over a [`PipelineOrchestrator`].
//!
//! ## Endpoints
//!
//! - `POST /v1/pipelines` - Run a pipeline, returns `PipelineResult`
//! - `GET /v1/status` - System status snapshot
//! - `GET /v1/history` - Recent run summaries
//! - `POST /v1/services/:id/reset` - Reset a service's resilience state
//! - `GET /health` - Aggregate service availability
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Example
//!
//! ```no_run
//! use augur::api::{create_router, AppState};
//! use augur::config::AugurConfig;
//! use augur::pipeline::PipelineOrchestrator;
//! use augur::registry::ServiceRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(ServiceRegistry::new());
//! let orchestrator = Arc::new(PipelineOrchestrator::builder(registry).build());
//! let config = Arc::new(AugurConfig::default());
//!
//! let state = Arc::new(AppState::new(orchestrator, config));
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8700").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Errors use the OpenAI error envelope:
//! ```json
//! {
//!   "error": {
//!     "message": "stage 'draft' references unknown service 'writer'",
//!     "type": "invalid_request_error",
//!     "param": "service",
//!     "code": "invalid_request_error"
//!   }
//! }
//! ```
//! Upstream failures are not errors at this layer: they come back as a
//! successful response whose `metadata.degraded` is set.

mod health;
mod pipelines;
pub mod types;

pub use types::*;

use crate::config::AugurConfig;
use crate::metrics::MetricsCollector;
use crate::pipeline::PipelineOrchestrator;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub config: Arc<AugurConfig>,
    /// Server startup time for uptime tracking
    pub start_time: Instant,
    pub metrics_collector: Arc<MetricsCollector>,
}

impl AppState {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, config: Arc<AugurConfig>) -> Self {
        let start_time = Instant::now();

        // A recorder may already be installed (tests, repeated construction)
        let prometheus_handle = crate::metrics::setup_metrics().unwrap_or_else(|e| {
            tracing::debug!("Metrics already initialized, creating new handle: {}", e);
            crate::metrics::PrometheusBuilder::new()
                .build_recorder()
                .handle()
        });

        let metrics_collector = Arc::new(MetricsCollector::new(
            Arc::clone(orchestrator.registry()),
            start_time,
            prometheus_handle,
        ));

        Self {
            orchestrator,
            config,
            start_time,
            metrics_collector,
        }
    }
}

/// Create the API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/v1/pipelines", post(pipelines::run))
        .route("/v1/status", get(pipelines::status))
        .route("/v1/history", get(pipelines::history))
        .route("/v1/services/:id/reset", post(pipelines::reset_service))
        .route("/health", get(health::handle))
        .route("/metrics", get(crate::metrics::handler::metrics_handler))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
