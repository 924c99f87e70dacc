//! Upstream provider abstraction.
//!
//! A [`Provider`] hides one upstream AI service behind a uniform
//! request/response contract. Providers are stored as `Arc<dyn Provider>` in
//! the service registry and are only ever called through the retrying client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod echo;
pub mod error;
pub mod factory;
pub mod http;

pub use echo::EchoProvider;
pub use error::ProviderError;
pub use factory::create_provider;
pub use http::HttpProvider;

use crate::config::ServiceConfig;

/// Payload sent to a provider for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Stage name
    pub stage: String,
    /// Stage-specific payload from the pipeline definition
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Output of the previous stage, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
}

impl ProviderRequest {
    pub fn new(stage: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            stage: stage.into(),
            payload,
            input: None,
        }
    }

    pub fn with_input(mut self, input: Option<serde_json::Value>) -> Self {
        self.input = input;
        self
    }
}

/// Provider answer for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: serde_json::Value,
    /// Provider-reported resource consumption (tokens, credits)
    #[serde(default)]
    pub resource_used: u64,
}

impl ProviderResponse {
    pub fn new(content: serde_json::Value) -> Self {
        Self {
            content,
            resource_used: 0,
        }
    }

    pub fn with_resource_used(mut self, resource_used: u64) -> Self {
        self.resource_used = resource_used;
        self
    }
}

/// Uniform interface over upstream AI services.
///
/// # Object Safety
///
/// Designed to be used as `Arc<dyn Provider>`; async methods go through
/// `async_trait`.
///
/// # Cancellation Safety
///
/// `invoke` and `is_healthy` must be cancellation-safe: the retrying client
/// drops them on timeout or caller cancellation.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Service id this provider serves.
    fn id(&self) -> &str;

    /// Implementation name for logs and status output.
    fn kind(&self) -> &'static str;

    /// One-time setup from configuration. Called before the first `invoke`.
    async fn initialize(&self, _config: &ServiceConfig) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Perform one upstream request.
    ///
    /// Must return `Err` for any non-2xx upstream answer. The caller enforces
    /// the per-service timeout.
    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Lightweight liveness probe used by the health monitor.
    async fn is_healthy(&self) -> bool {
        true
    }

    /// Release resources at shutdown.
    async fn cleanup(&self) {}
}
