//! Error types for fallback strategies.

use crate::classifier::{ErrorInfo, ErrorType, Severity};
use thiserror::Error;

/// Why a single strategy could not produce output.
#[derive(Debug, Clone, Error)]
pub enum FallbackError {
    /// Secondary provider call failed
    #[error("secondary provider failed: {0}")]
    Provider(ErrorInfo),

    /// Nothing cached for the stage, or the entry is too old
    #[error("no cached response for stage '{0}'")]
    NoCachedResponse(String),

    /// Template references `{input}` but the stage has none
    #[error("template needs input but stage '{0}' has none")]
    MissingInput(String),
}

impl FallbackError {
    /// Error record for the strategy's failed trace step.
    pub fn into_error_info(self) -> ErrorInfo {
        match self {
            FallbackError::Provider(info) => info,
            other => ErrorInfo::new(ErrorType::System, Severity::Low, other.to_string()),
        }
    }
}
