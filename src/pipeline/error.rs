//! Pipeline misuse errors.
//!
//! Runtime failures never surface here: they are absorbed by fallbacks and
//! degradation. These are the synchronous rejections for malformed requests.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// No stages supplied
    #[error("pipeline has no stages")]
    EmptyPipeline,

    /// A stage references a service that isn't registered
    #[error("stage '{stage}' references unknown service '{service}'")]
    UnknownService { stage: String, service: String },

    /// A stage has an empty name
    #[error("stage {index} has an empty name")]
    UnnamedStage { index: usize },

    /// Orchestrator no longer accepts runs
    #[error("orchestrator is shutting down")]
    ShuttingDown,
}
