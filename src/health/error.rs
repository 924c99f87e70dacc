//! Error types for health checking.

use thiserror::Error;

/// Why a provider probe counted as failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealthCheckError {
    /// Probe did not answer in time
    #[error("probe timeout after {0}s")]
    Timeout(u64),

    /// Provider answered but reported itself unhealthy
    #[error("provider reported unhealthy")]
    Unhealthy,
}
