//! Upstream service configuration

use crate::resilience::{CircuitBreakerConfig, RateLimitConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Provider implementation backing a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// JSON-over-HTTP upstream
    #[default]
    Http,
    /// Local provider that answers with its request
    Echo,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Http => write!(f, "http"),
            ProviderKind::Echo => write!(f, "echo"),
        }
    }
}

/// One `[[services]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_invoke_path")]
    pub invoke_path: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Overrides `[rate_limit].window_ms`
    #[serde(default)]
    pub rate_limit_window_ms: Option<u64>,
    /// Overrides `[rate_limit].limit`
    #[serde(default)]
    pub rate_limit_count: Option<u32>,
    /// Overrides `[circuit_breaker]`
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    /// Simulated latency for echo providers
    #[serde(default)]
    pub echo_latency_ms: u64,
}

fn default_invoke_path() -> String {
    "/v1/invoke".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

impl ServiceConfig {
    /// Minimal config for a service with the given id and kind.
    pub fn new(id: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            id: id.into(),
            kind,
            base_url: None,
            api_key: None,
            api_key_env: None,
            invoke_path: default_invoke_path(),
            health_path: default_health_path(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            rate_limit_window_ms: None,
            rate_limit_count: None,
            circuit_breaker: None,
            echo_latency_ms: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Effective rate limit tier, falling back to the global default.
    pub fn rate_limit(&self, defaults: &RateLimitConfig) -> RateLimitConfig {
        RateLimitConfig {
            limit: self.rate_limit_count.unwrap_or(defaults.limit),
            window_ms: self.rate_limit_window_ms.unwrap_or(defaults.window_ms),
        }
    }

    /// Effective breaker settings, falling back to the global default.
    pub fn circuit_breaker(&self, defaults: &CircuitBreakerConfig) -> CircuitBreakerConfig {
        self.circuit_breaker
            .clone()
            .unwrap_or_else(|| defaults.clone())
    }

    /// Resolve the API key from `api_key` or the variable named by `api_key_env`.
    pub fn resolve_api_key(&self) -> Result<Option<String>, String> {
        if let Some(key) = &self.api_key {
            return Ok(Some(key.clone()));
        }
        match &self.api_key_env {
            Some(var) => std::env::var(var)
                .map(Some)
                .map_err(|e| format!("Failed to read API key from env var '{}': {}", var, e)),
            None => Ok(None),
        }
    }
}
