//! Error types for provider operations.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by upstream providers (or on their behalf by the client).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network connectivity error (DNS, connection refused, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded its deadline.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Upstream returned a non-2xx response.
    #[error("Upstream error {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        /// Parsed `Retry-After` header, when present
        retry_after_ms: Option<u64>,
    },

    /// Upstream response doesn't match the expected format.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Provider configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `invoke` called before `initialize`.
    #[error("Provider '{0}' used before initialization")]
    NotInitialized(String),

    /// Caller cancelled the request or its deadline passed.
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// Anything else a provider wants to report.
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        ProviderError::Upstream {
            status,
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// HTTP status for upstream failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::Upstream {
                retry_after_ms: Some(ms),
                ..
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ProviderError::upstream(503, "overloaded");
        assert_eq!(err.to_string(), "Upstream error 503: overloaded");
        assert_eq!(
            ProviderError::Timeout(1500).to_string(),
            "Request timeout after 1500ms"
        );
    }

    #[test]
    fn test_retry_after() {
        let err = ProviderError::Upstream {
            status: 429,
            message: "slow down".into(),
            retry_after_ms: Some(2000),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(err.status(), Some(429));
        assert!(ProviderError::Network("x".into()).retry_after().is_none());
    }
}
