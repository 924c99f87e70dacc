//! HTTP API integration tests against the router, without a listener.

mod common;

use augur::api::{create_router, AppState};
use augur::config::AugurConfig;
use augur::provider::ProviderError;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{orchestrator, registry_of, settings, ScriptedProvider};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app_with(config: AugurConfig) -> (Router, Arc<AppState>) {
    let registry = registry_of(vec![
        (ScriptedProvider::ok("writer", json!({"text": "hello"})), settings(0)),
        (
            ScriptedProvider::failing("broken", ProviderError::upstream(500, "down")),
            settings(0),
        ),
    ]);
    let state = Arc::new(AppState::new(
        Arc::new(orchestrator(registry)),
        Arc::new(config),
    ));
    (create_router(Arc::clone(&state)), state)
}

fn app() -> (Router, Arc<AppState>) {
    app_with(AugurConfig::default())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn pipeline(primary: &str) -> Value {
    json!({
        "stages": [
            {"name": "draft", "primary": {"service": primary, "payload": {"topic": "rust"}}}
        ]
    })
}

#[tokio::test]
async fn test_run_pipeline_returns_result() {
    let (app, _) = app();

    let response = app
        .oneshot(post_json("/v1/pipelines", pipeline("writer")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["output"]["text"], "hello");
    assert_eq!(body["metadata"]["degraded"], false);
    assert_eq!(body["trace"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upstream_failure_is_degraded_not_an_error() {
    let mut config = AugurConfig::default();
    config.fallback.strategies.clear();
    let (app, _) = app_with(config);

    let response = app
        .oneshot(post_json("/v1/pipelines", pipeline("broken")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["metadata"]["degraded"], true);
}

#[tokio::test]
async fn test_unknown_service_is_bad_request() {
    let (app, _) = app();

    let response = app
        .oneshot(post_json("/v1/pipelines", pipeline("ghost")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["param"], "service");
    assert!(body["error"]["message"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn test_empty_pipeline_is_bad_request() {
    let (app, _) = app();

    let response = app
        .oneshot(post_json("/v1/pipelines", json!({"stages": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let (app, _) = app();

    let response = app
        .oneshot(post_json("/v1/pipelines", json!({"steps": "nope"})))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_shutdown_returns_service_unavailable() {
    let (app, state) = app();
    state.orchestrator.shutdown().await;

    let response = app
        .oneshot(post_json("/v1/pipelines", pipeline("writer")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_status_lists_services() {
    let (app, _) = app();

    let response = app.oneshot(get("/v1/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let services = body["services"].as_array().unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(body["accepting_requests"], true);
    assert_eq!(body["queue_depth"], 0);
    assert!(services.iter().any(|s| s["id"] == "writer"));
}

#[tokio::test]
async fn test_history_reflects_runs() {
    let (app, _) = app();

    let run = app
        .clone()
        .oneshot(post_json("/v1/pipelines", pipeline("writer")))
        .await
        .unwrap();
    let request_id = body_json(run).await["request_id"].clone();

    let response = app.oneshot(get("/v1/history")).await.unwrap();
    let body = body_json(response).await;
    let runs = body.as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["request_id"], request_id);
}

#[tokio::test]
async fn test_reset_known_and_unknown_service() {
    let (app, state) = app();
    state.orchestrator.run(&[common::stage("s", "broken")]).await.unwrap();
    assert!(
        state
            .orchestrator
            .registry()
            .usage_stats("broken")
            .unwrap()
            .total_requests
            > 0
    );

    let response = app
        .clone()
        .oneshot(post_json("/v1/services/broken/reset", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["service"], "broken");
    assert_eq!(body["reset"], true);
    assert_eq!(
        state
            .orchestrator
            .registry()
            .usage_stats("broken")
            .unwrap()
            .total_requests,
        0
    );

    let response = app
        .oneshot(post_json("/v1/services/ghost/reset", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "service_not_found");
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = app();

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["services"]["total"], 2);
    assert_eq!(body["accepting_requests"], true);
    assert!(["healthy", "degraded", "unhealthy"].contains(&body["status"].as_str().unwrap()));
}

#[tokio::test]
async fn test_metrics_endpoint_is_prometheus_text() {
    let (app, _) = app();

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_body_limit_rejects_oversized_requests() {
    let mut config = AugurConfig::default();
    config.server.max_body_bytes = 64;
    let (app, _) = app_with(config);

    let big = "x".repeat(1024);
    let response = app
        .oneshot(post_json(
            "/v1/pipelines",
            json!({"stages": [{"name": big, "primary": {"service": "writer"}}]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
