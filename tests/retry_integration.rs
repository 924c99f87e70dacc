//! Timing behavior of the retrying client under paused tokio time.

mod common;

use augur::classifier::ErrorType;
use augur::provider::{ProviderError, ProviderRequest};
use augur::resilience::{
    CircuitBreakerConfig, CircuitState, RateLimitConfig, RequestScope, RetryingClient,
};
use common::{registry_of, retry_config, settings, settings_with, ScriptedProvider};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn request() -> ProviderRequest {
    ProviderRequest::new("stage", json!({"q": 1}))
}

#[tokio::test(start_paused = true)]
async fn test_retries_wait_for_computed_backoff() {
    let provider = ScriptedProvider::flaky("svc", 2, json!("done"));
    let registry = registry_of(vec![(provider.clone(), settings(3))]);
    let config = retry_config(100);
    let client = RetryingClient::new(Arc::clone(&registry), config.clone());

    let started = Instant::now();
    let response = client
        .call("svc", &request(), &RequestScope::unbounded())
        .await
        .unwrap();

    assert_eq!(response.content, json!("done"));
    assert_eq!(provider.calls(), 3);
    let expected = config.exponential_delay(0) + config.exponential_delay(1);
    assert_eq!(expected, Duration::from_millis(300));
    assert!(started.elapsed() >= expected);

    let usage = registry.usage_stats("svc").unwrap();
    assert_eq!(usage.total_requests, 3);
    assert_eq!(usage.successful_requests, 1);
    assert_eq!(usage.failed_requests, 2);
    assert_eq!(registry.get("svc").unwrap().circuit().failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhaustion_reports_attempts() {
    let provider = ScriptedProvider::failing("svc", ProviderError::Timeout(50));
    let registry = registry_of(vec![(provider.clone(), settings(2))]);
    let client = RetryingClient::new(Arc::clone(&registry), retry_config(10));

    let error = client
        .call("svc", &request(), &RequestScope::unbounded())
        .await
        .unwrap_err();

    assert_eq!(error.error_type, ErrorType::Timeout);
    assert_eq!(error.retry_attempts, 2);
    assert_eq!(error.max_retries, 2);
    assert_eq!(provider.calls(), 3);
    assert_eq!(error.service.as_ref().map(|s| s.as_str()), Some("svc"));
    // One breaker failure per exhausted call
    assert_eq!(registry.get("svc").unwrap().circuit().failure_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_raises_the_delay() {
    let provider = ScriptedProvider::new(
        "svc",
        vec![
            Err(ProviderError::Upstream {
                status: 429,
                message: "slow down".into(),
                retry_after_ms: Some(5_000),
            }),
            Ok(json!("ok")),
        ],
    );
    let registry = registry_of(vec![(provider, settings(1))]);
    let client = RetryingClient::new(registry, retry_config(10));

    let started = Instant::now();
    client
        .call("svc", &request(), &RequestScope::unbounded())
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_rate_window_delays_third_call() {
    let provider = ScriptedProvider::ok("svc", json!("ok"));
    let registry = registry_of(vec![(
        provider.clone(),
        settings_with(
            0,
            RateLimitConfig {
                limit: 2,
                window_ms: 1_000,
            },
            CircuitBreakerConfig::default(),
        ),
    )]);
    let client = RetryingClient::new(Arc::clone(&registry), retry_config(10));
    let scope = RequestScope::unbounded();

    let started = Instant::now();
    client.call("svc", &request(), &scope).await.unwrap();
    client.call("svc", &request(), &scope).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(1_000));

    client.call("svc", &request(), &scope).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(1_000));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_interrupts_without_touching_breaker() {
    let provider =
        ScriptedProvider::with_latency("slow", vec![Ok(json!("late"))], Duration::from_secs(10));
    let registry = registry_of(vec![(
        provider,
        settings_with(
            3,
            RateLimitConfig::default(),
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        ),
    )]);
    let client = RetryingClient::new(Arc::clone(&registry), retry_config(10));
    let scope = RequestScope::unbounded().with_timeout(Duration::from_secs(1));

    let started = Instant::now();
    let error = client.call("slow", &request(), &scope).await.unwrap_err();

    assert_eq!(error.error_type, ErrorType::Timeout);
    assert!(started.elapsed() < Duration::from_secs(10));
    let circuit = registry.get("slow").unwrap().circuit();
    assert_eq!(circuit.state, CircuitState::Closed);
    assert_eq!(circuit.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_backoff() {
    let provider = ScriptedProvider::failing("svc", ProviderError::Network("reset".into()));
    let registry = registry_of(vec![(provider.clone(), settings(5))]);
    let client = Arc::new(RetryingClient::new(registry, retry_config(60_000)));
    let scope = RequestScope::unbounded();

    let task = {
        let client = Arc::clone(&client);
        let scope = scope.clone();
        tokio::spawn(async move { client.call("svc", &request(), &scope).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    scope.cancel();

    let error = task.await.unwrap().unwrap_err();
    assert_eq!(error.error_type, ErrorType::Timeout);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_trial_closes_circuit() {
    let provider = ScriptedProvider::new(
        "svc",
        vec![Err(ProviderError::upstream(500, "down")), Ok(json!("back"))],
    );
    let registry = registry_of(vec![(
        provider.clone(),
        settings_with(
            0,
            RateLimitConfig::default(),
            CircuitBreakerConfig {
                failure_threshold: 1,
                reset_timeout_ms: 1_000,
                monitoring_period_ms: 300_000,
            },
        ),
    )]);
    let client = RetryingClient::new(Arc::clone(&registry), retry_config(10));
    let scope = RequestScope::unbounded();

    assert!(client.call("svc", &request(), &scope).await.is_err());
    let rejected = client.call("svc", &request(), &scope).await.unwrap_err();
    assert_eq!(rejected.error_type, ErrorType::System);
    assert_eq!(provider.calls(), 1);

    tokio::time::advance(Duration::from_millis(1_000)).await;

    let response = client.call("svc", &request(), &scope).await.unwrap();
    assert_eq!(response.content, json!("back"));
    assert_eq!(
        registry.get("svc").unwrap().circuit().state,
        CircuitState::Closed
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_service_does_not_block_others() {
    let slow =
        ScriptedProvider::with_latency("slow", vec![Ok(json!("slow"))], Duration::from_secs(20));
    let fast = ScriptedProvider::ok("fast", json!("fast"));
    let registry = registry_of(vec![(slow, settings(0)), (fast, settings(0))]);
    let client = Arc::new(RetryingClient::new(registry, retry_config(10)));

    let slow_task = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .call("slow", &request(), &RequestScope::unbounded())
                .await
        })
    };
    tokio::task::yield_now().await;

    let started = Instant::now();
    let fast_response = client
        .call("fast", &request(), &RequestScope::unbounded())
        .await
        .unwrap();
    assert_eq!(fast_response.content, json!("fast"));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!slow_task.is_finished());

    assert!(slow_task.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_trial_call_releases_half_open_slot() {
    let provider = ScriptedProvider::with_latency(
        "svc",
        vec![Err(ProviderError::upstream(500, "down")), Ok(json!("back"))],
        Duration::from_secs(5),
    );
    let registry = registry_of(vec![(
        provider.clone(),
        settings_with(
            0,
            RateLimitConfig::default(),
            CircuitBreakerConfig {
                failure_threshold: 1,
                reset_timeout_ms: 100,
                monitoring_period_ms: 300_000,
            },
        ),
    )]);
    let client = RetryingClient::new(Arc::clone(&registry), retry_config(10));
    let scope = RequestScope::unbounded();

    assert!(client.call("svc", &request(), &scope).await.is_err());
    tokio::time::advance(Duration::from_millis(100)).await;

    // The trial call is abandoned by its caller before the provider answers
    let dropped =
        tokio::time::timeout(Duration::from_millis(10), client.call("svc", &request(), &scope))
            .await;
    assert!(dropped.is_err());
    assert_eq!(
        registry.get("svc").unwrap().circuit().state,
        CircuitState::HalfOpen
    );

    // The next caller gets the trial right away and closes the circuit
    let response = client.call("svc", &request(), &scope).await.unwrap();
    assert_eq!(response.content, json!("back"));
    assert_eq!(
        registry.get("svc").unwrap().circuit().state,
        CircuitState::Closed
    );
    assert_eq!(registry.usage_stats("svc").unwrap().rejected_requests, 0);
}
