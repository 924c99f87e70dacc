//! HTTP server configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[server]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on a whole `POST /v1/pipelines` request
    pub request_timeout_seconds: u64,
    /// Maximum accepted request body
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8700,
            request_timeout_seconds: 300,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8700);
        assert_eq!(config.request_timeout_seconds, 300);
        assert_eq!(config.max_body_bytes, 2 * 1024 * 1024);
        assert_eq!(config.bind_addr(), "0.0.0.0:8700");
    }
}
