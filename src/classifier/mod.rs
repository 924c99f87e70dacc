//! Failure classification.
//!
//! Maps raw provider failures onto the [`ErrorType`] taxonomy. Structured
//! signals (error variant, HTTP status) win; free-form messages fall back to
//! keyword matching.

pub mod types;

pub use types::{ErrorContext, ErrorInfo, ErrorType, Severity};

use crate::provider::ProviderError;

/// Message fragments that make a failure unrecoverable.
const UNRECOVERABLE_KEYWORDS: &[&str] = &[
    "forbidden",
    "invalid key",
    "invalid api key",
    "permission denied",
];

/// Keyword table for messages with no structured code. First match wins.
const TYPE_KEYWORDS: &[(ErrorType, &[&str])] = &[
    (
        ErrorType::RateLimit,
        &["rate limit", "too many requests", "quota", "429"],
    ),
    (
        ErrorType::Authentication,
        &[
            "unauthorized",
            "authentication",
            "api key",
            "invalid key",
            "forbidden",
            "permission denied",
            "401",
            "403",
        ],
    ),
    (
        ErrorType::Timeout,
        &["timeout", "timed out", "deadline", "cancelled"],
    ),
    (
        ErrorType::Network,
        &[
            "network",
            "connection",
            "econnrefused",
            "econnreset",
            "dns",
            "socket",
        ],
    ),
    (
        ErrorType::Security,
        &["security", "injection", "malicious", "blocked content"],
    ),
    (
        ErrorType::Validation,
        &["validation", "invalid", "malformed", "required field"],
    ),
    (
        ErrorType::ApiError,
        &["api error", "upstream", "server error", "bad gateway", "unavailable"],
    ),
];

/// Classifies raw failures into [`ErrorInfo`] records.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a provider failure that happened in `context`.
    pub fn classify(&self, raw: &ProviderError, context: ErrorContext) -> ErrorInfo {
        let message = raw.to_string();
        let error_type = structured_type(raw).unwrap_or_else(|| keyword_type(&message));
        self.build(error_type, message, context)
    }

    /// Classify a free-form message with no structured code.
    pub fn classify_message(&self, message: &str, context: ErrorContext) -> ErrorInfo {
        self.build(keyword_type(message), message.to_string(), context)
    }

    /// Fail-fast record for calls rejected by an open circuit.
    pub fn circuit_open(&self, context: ErrorContext) -> ErrorInfo {
        let message = match &context.service {
            Some(service) => format!("circuit breaker open for service '{}'", service),
            None => "circuit breaker open".to_string(),
        };
        ErrorInfo::new(ErrorType::System, Severity::Medium, message)
            .with_context(context.with_detail("reason", "circuit_open"))
    }

    fn build(&self, error_type: ErrorType, message: String, context: ErrorContext) -> ErrorInfo {
        let lowered = message.to_lowercase();
        let severity = keyword_severity(&lowered).max(error_type.severity_floor());
        let recoverable = error_type != ErrorType::Authentication
            && !UNRECOVERABLE_KEYWORDS.iter().any(|k| lowered.contains(k));

        let mut info = ErrorInfo::new(error_type, severity, message).with_context(context);
        info.recoverable = recoverable;
        info
    }
}

/// Type from the error variant and HTTP status, when they are decisive.
fn structured_type(raw: &ProviderError) -> Option<ErrorType> {
    match raw {
        ProviderError::Timeout(_) | ProviderError::Cancelled(_) => Some(ErrorType::Timeout),
        ProviderError::Network(_) => Some(ErrorType::Network),
        ProviderError::InvalidResponse(_) => Some(ErrorType::ApiError),
        ProviderError::NotInitialized(_) => Some(ErrorType::System),
        ProviderError::Upstream { status, .. } => match status {
            401 | 403 => Some(ErrorType::Authentication),
            408 | 504 => Some(ErrorType::Timeout),
            429 => Some(ErrorType::RateLimit),
            400 | 404 | 409 | 413 | 422 => Some(ErrorType::Validation),
            500..=599 => Some(ErrorType::ApiError),
            _ => None,
        },
        ProviderError::Configuration(_) | ProviderError::Other(_) => None,
    }
}

fn keyword_type(message: &str) -> ErrorType {
    let lowered = message.to_lowercase();
    TYPE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(error_type, _)| *error_type)
        .unwrap_or(ErrorType::System)
}

fn keyword_severity(lowered: &str) -> Severity {
    if lowered.contains("critical") || lowered.contains("fatal") {
        Severity::Critical
    } else if lowered.contains("authentication") || lowered.contains("security") {
        Severity::High
    } else if lowered.contains("rate limit") || lowered.contains("timeout") {
        Severity::Medium
    } else {
        Severity::Low
    }
}
