//! Error taxonomy shared by the retrying client, fallback chain and traces.

use crate::registry::ServiceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Classified failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    ApiError,
    RateLimit,
    Authentication,
    Network,
    Timeout,
    Validation,
    Security,
    System,
}

impl ErrorType {
    /// Types worth retrying against the same service.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorType::Timeout | ErrorType::Network | ErrorType::RateLimit
        )
    }

    /// Severity implied by the type alone.
    pub fn severity_floor(self) -> Severity {
        match self {
            ErrorType::Authentication | ErrorType::Security => Severity::High,
            ErrorType::RateLimit | ErrorType::Timeout => Severity::Medium,
            _ => Severity::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::ApiError => "api_error",
            ErrorType::RateLimit => "rate_limit",
            ErrorType::Authentication => "authentication",
            ErrorType::Network => "network",
            ErrorType::Timeout => "timeout",
            ErrorType::Validation => "validation",
            ErrorType::Security => "security",
            ErrorType::System => "system",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Where a failure happened, supplied by the caller of the classifier.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub service: Option<ServiceId>,
    pub stage: Option<String>,
    pub max_retries: u32,
    pub details: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn for_service(service: &ServiceId) -> Self {
        Self {
            service: Some(service.clone()),
            ..Self::default()
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// A classified failure occurrence.
///
/// Created once per failure; only `retry_attempts` changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceId>,
    pub recoverable: bool,
    pub retry_attempts: u32,
    pub max_retries: u32,
}

impl ErrorInfo {
    /// Build an error record directly, bypassing classification.
    pub fn new(error_type: ErrorType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            error_type,
            severity,
            message: message.into(),
            context: BTreeMap::new(),
            timestamp: Utc::now(),
            service: None,
            recoverable: error_type != ErrorType::Authentication,
            retry_attempts: 0,
            max_retries: 0,
        }
    }

    pub(crate) fn with_context(mut self, context: ErrorContext) -> Self {
        let ErrorContext {
            service,
            stage,
            max_retries,
            mut details,
        } = context;
        if let Some(stage) = stage {
            details.insert("stage".to_string(), stage);
        }
        self.service = service;
        self.max_retries = max_retries;
        self.context = details;
        self
    }

    pub fn is_transient(&self) -> bool {
        self.error_type.is_transient()
    }

    /// Recoverable, transient, and retry budget left.
    pub fn is_retryable(&self) -> bool {
        self.recoverable && self.is_transient() && self.retry_attempts < self.max_retries
    }

    pub fn stage(&self) -> Option<&str> {
        self.context.get("stage").map(String::as_str)
    }

    pub(crate) fn set_retry_attempts(&mut self, attempts: u32) {
        self.retry_attempts = attempts;
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.error_type, self.severity, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_types() {
        assert!(ErrorType::Timeout.is_transient());
        assert!(ErrorType::Network.is_transient());
        assert!(ErrorType::RateLimit.is_transient());
        assert!(!ErrorType::ApiError.is_transient());
        assert!(!ErrorType::Validation.is_transient());
        assert!(!ErrorType::System.is_transient());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_retryable_respects_budget() {
        let mut info = ErrorInfo::new(ErrorType::Network, Severity::Low, "reset")
            .with_context(ErrorContext::default().with_max_retries(2));
        assert!(info.is_retryable());
        info.set_retry_attempts(2);
        assert!(!info.is_retryable());
    }

    #[test]
    fn test_context_records_stage() {
        let info = ErrorInfo::new(ErrorType::System, Severity::Low, "boom").with_context(
            ErrorContext::for_service(&ServiceId::from("svc-a")).with_stage("summarize"),
        );
        assert_eq!(info.stage(), Some("summarize"));
        assert_eq!(info.service.as_ref().map(|s| s.as_str()), Some("svc-a"));
    }

    #[test]
    fn test_serializes_type_field() {
        let info = ErrorInfo::new(ErrorType::RateLimit, Severity::Medium, "slow down");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "rate_limit");
        assert_eq!(json["severity"], "medium");
        assert!(json.get("service").is_none());
    }
}
