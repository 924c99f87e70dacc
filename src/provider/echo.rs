//! Local provider that answers with its own request.
//!
//! Useful for dry runs of pipeline definitions and for smoke-testing a
//! deployment without touching real upstreams.

use super::{Provider, ProviderError, ProviderRequest, ProviderResponse};
use crate::config::ServiceConfig;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub struct EchoProvider {
    id: String,
    latency_ms: AtomicU64,
}

impl EchoProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            latency_ms: AtomicU64::new(0),
        }
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
        self
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "echo"
    }

    async fn initialize(&self, config: &ServiceConfig) -> Result<(), ProviderError> {
        self.latency_ms
            .store(config.echo_latency_ms, Ordering::Relaxed);
        Ok(())
    }

    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let content = json!({
            "service": self.id,
            "stage": request.stage,
            "payload": request.payload,
            "input": request.input,
        });
        // Heuristic: roughly four bytes per token
        let resource_used = (content.to_string().len() / 4) as u64;

        Ok(ProviderResponse::new(content).with_resource_used(resource_used))
    }
}
