//! Pipeline stage definitions.

use crate::registry::ServiceId;
use serde::{Deserialize, Serialize};

/// A single upstream call: which service, with which payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageAction {
    pub service: ServiceId,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl StageAction {
    pub fn new(service: impl Into<ServiceId>, payload: serde_json::Value) -> Self {
        Self {
            service: service.into(),
            payload,
        }
    }
}

/// One step of a pipeline. Stages run strictly in order and each stage
/// receives the previous stage's output as its input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub name: String,
    pub primary: StageAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<StageAction>,
}

impl PipelineStage {
    pub fn new(name: impl Into<String>, primary: StageAction) -> Self {
        Self {
            name: name.into(),
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: StageAction) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Services this stage may call directly.
    pub fn services(&self) -> impl Iterator<Item = &ServiceId> {
        std::iter::once(&self.primary.service).chain(self.fallback.iter().map(|f| &f.service))
    }
}
