//! Health check endpoint handler.

use crate::api::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub accepting_requests: bool,
    pub services: ServiceCounts,
}

/// Service availability counts.
#[derive(Debug, Serialize)]
pub struct ServiceCounts {
    pub total: usize,
    pub available: usize,
    pub unavailable: usize,
}

/// GET /health - aggregate of the advisory health map.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.orchestrator.registry().health_map();
    let total = health.len();
    let available = health.values().filter(|up| **up).count();

    Json(HealthResponse {
        status: overall_status(available, total).to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        accepting_requests: state.orchestrator.is_accepting(),
        services: ServiceCounts {
            total,
            available,
            unavailable: total - available,
        },
    })
}

fn overall_status(available: usize, total: usize) -> &'static str {
    match (available, total) {
        (a, t) if a == t && t > 0 => "healthy",
        (a, _) if a > 0 => "degraded",
        _ => "unhealthy",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_status() {
        assert_eq!(overall_status(2, 2), "healthy");
        assert_eq!(overall_status(1, 2), "degraded");
        assert_eq!(overall_status(0, 2), "unhealthy");
        assert_eq!(overall_status(0, 0), "unhealthy");
    }
}
