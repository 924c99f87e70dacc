//! Configuration module for Augur
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`AUGUR_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use augur::config::AugurConfig;
//!
//! let config = AugurConfig::default();
//! assert_eq!(config.server.port, 8700);
//!
//! let toml = r#"
//! [server]
//! port = 9000
//!
//! [[services]]
//! id = "writer"
//! type = "echo"
//! "#;
//! let config: AugurConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.server.port, 9000);
//! assert_eq!(config.services.len(), 1);
//! ```

pub mod error;
pub mod fallback;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod service;

pub use error::ConfigError;
pub use fallback::FallbackConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use pipeline::PipelineConfig;
pub use server::ServerConfig;
pub use service::{ProviderKind, ServiceConfig};

pub use crate::health::HealthCheckConfig;
pub use crate::resilience::{CircuitBreakerConfig, RateLimitConfig, RetryConfig};

use crate::fallback::StrategyAction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Unified configuration for the Augur orchestrator.
///
/// `[retry]`, `[circuit_breaker]` and `[rate_limit]` are defaults; each
/// `[[services]]` entry may override the breaker and rate limit tier.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AugurConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub health_check: HealthCheckConfig,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimitConfig,
    pub pipeline: PipelineConfig,
    pub fallback: FallbackConfig,
    /// Upstream services
    pub services: Vec<ServiceConfig>,
}

impl AugurConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply `AUGUR_*` environment variable overrides.
    ///
    /// Invalid values are ignored and the current value kept.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("AUGUR_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("AUGUR_HOST") {
            self.server.host = host;
        }

        if let Ok(level) = std::env::var("AUGUR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("AUGUR_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(health) = std::env::var("AUGUR_HEALTH_CHECK") {
            self.health_check.enabled = health.to_lowercase() == "true";
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "port must be non-zero"));
        }

        if self.rate_limit.limit == 0 || self.rate_limit.window_ms == 0 {
            return Err(ConfigError::invalid(
                "rate_limit",
                "limit and window_ms must be non-zero",
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "circuit_breaker.failure_threshold",
                "threshold must be non-zero",
            ));
        }

        let mut seen = HashSet::new();
        for (i, service) in self.services.iter().enumerate() {
            if service.id.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("services[{}].id", i),
                    "id cannot be empty",
                ));
            }
            if !seen.insert(service.id.as_str()) {
                return Err(ConfigError::invalid(
                    format!("services[{}].id", i),
                    format!("duplicate service id '{}'", service.id),
                ));
            }
            if service.kind == ProviderKind::Http
                && service.base_url.as_deref().map_or(true, str::is_empty)
            {
                return Err(ConfigError::MissingField(format!("services[{}].base_url", i)));
            }

            let limits = service.rate_limit(&self.rate_limit);
            if limits.limit == 0 || limits.window_ms == 0 {
                return Err(ConfigError::invalid(
                    format!("services[{}].rate_limit", i),
                    "limit and window_ms must be non-zero",
                ));
            }
            if service.circuit_breaker(&self.circuit_breaker).failure_threshold == 0 {
                return Err(ConfigError::invalid(
                    format!("services[{}].circuit_breaker.failure_threshold", i),
                    "threshold must be non-zero",
                ));
            }
            if service.timeout_ms == 0 {
                return Err(ConfigError::invalid(
                    format!("services[{}].timeout_ms", i),
                    "timeout must be non-zero",
                ));
            }
        }

        for (i, strategy) in self.fallback.strategies.iter().enumerate() {
            if let StrategyAction::SecondaryProvider { service } = &strategy.action {
                if !seen.contains(service.as_str()) {
                    return Err(ConfigError::invalid(
                        format!("fallback.strategies[{}].action.service", i),
                        format!("unknown service '{}'", service),
                    ));
                }
            }
        }

        if self.health_check.enabled {
            if self.health_check.interval_seconds == 0 {
                return Err(ConfigError::invalid(
                    "health_check.interval_seconds",
                    "interval must be non-zero",
                ));
            }
            if self.health_check.timeout_seconds == 0 {
                return Err(ConfigError::invalid(
                    "health_check.timeout_seconds",
                    "timeout must be non-zero",
                ));
            }
        }

        if self.pipeline.history_capacity == 0 {
            return Err(ConfigError::invalid(
                "pipeline.history_capacity",
                "capacity must be non-zero",
            ));
        }

        if self.pipeline.cache_capacity == 0 {
            return Err(ConfigError::invalid(
                "pipeline.cache_capacity",
                "capacity must be non-zero",
            ));
        }

        Ok(())
    }
}
