//! JSON-over-HTTP provider.
//!
//! Sends `POST {base_url}{invoke_path}` with the [`ProviderRequest`] as the
//! body and expects a JSON answer. Health is probed with
//! `GET {base_url}{health_path}`.

use super::{Provider, ProviderError, ProviderRequest, ProviderResponse};
use crate::config::ServiceConfig;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
struct HttpSettings {
    invoke_url: String,
    health_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

/// Provider for HTTP upstreams.
pub struct HttpProvider {
    id: String,
    client: Arc<Client>,
    settings: OnceLock<HttpSettings>,
}

impl HttpProvider {
    pub fn new(id: impl Into<String>, client: Arc<Client>) -> Self {
        Self {
            id: id.into(),
            client,
            settings: OnceLock::new(),
        }
    }

    fn settings(&self) -> Result<&HttpSettings, ProviderError> {
        self.settings
            .get()
            .ok_or_else(|| ProviderError::NotInitialized(self.id.clone()))
    }

    fn map_send_error(e: reqwest::Error, timeout: Duration) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(timeout.as_millis() as u64)
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}

/// Token usage, when the upstream reports it OpenAI-style.
fn resource_used(body: &serde_json::Value) -> u64 {
    body.get("usage")
        .and_then(|u| u.get("total_tokens"))
        .and_then(|t| t.as_u64())
        .unwrap_or(0)
}

fn truncate(mut message: String) -> String {
    if message.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
        message.push_str("...");
    }
    message
}

#[async_trait]
impl Provider for HttpProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "http"
    }

    async fn initialize(&self, config: &ServiceConfig) -> Result<(), ProviderError> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "service '{}' requires a base_url",
                    config.id
                ))
            })?
            .trim_end_matches('/');

        let api_key = config
            .resolve_api_key()
            .map_err(ProviderError::Configuration)?;

        let settings = HttpSettings {
            invoke_url: format!("{}{}", base_url, config.invoke_path),
            health_url: format!("{}{}", base_url, config.health_path),
            api_key,
            timeout: config.timeout(),
        };

        if self.settings.set(settings).is_err() {
            tracing::debug!(service = %self.id, "HTTP provider already initialized");
        }
        Ok(())
    }

    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let settings = self.settings()?;

        let mut req = self
            .client
            .post(&settings.invoke_url)
            .json(&request)
            .timeout(settings.timeout);
        if let Some(key) = &settings.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, settings.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("upstream error")
                    .to_string()
            } else {
                truncate(body)
            };
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message,
                retry_after_ms,
            });
        }

        let body = response.text().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to read response body: {}", e))
        })?;
        let content: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        let used = resource_used(&content);
        Ok(ProviderResponse::new(content).with_resource_used(used))
    }

    // Unbounded here; the health monitor applies `[health_check].timeout_seconds`
    async fn is_healthy(&self) -> bool {
        let Ok(settings) = self.settings() else {
            return false;
        };

        let mut req = self.client.get(&settings.health_url);
        if let Some(key) = &settings.api_key {
            req = req.bearer_auth(key);
        }

        match req.send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(service = %self.id, error = %e, "Health probe failed");
                false
            }
        }
    }

    async fn cleanup(&self) {
        tracing::debug!(service = %self.id, "HTTP provider released");
    }
}
