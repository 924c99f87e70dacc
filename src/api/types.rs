//! Request and error types for the HTTP surface.

use crate::pipeline::{PipelineError, PipelineStage};
use crate::registry::RegistryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/pipelines`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineRequest {
    pub stages: Vec<PipelineStage>,
    /// Overall deadline for the run, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

/// Response of `POST /v1/services/:id/reset`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResetResponse {
    pub service: String,
    pub reset: bool,
}

/// API error response in OpenAI format.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

/// Error details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiError {
    /// Create a bad request error (400).
    pub fn bad_request(message: &str) -> Self {
        Self::invalid_request(message, None)
    }

    fn invalid_request(message: &str, param: Option<&str>) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.to_string(),
                r#type: "invalid_request_error".to_string(),
                param: param.map(str::to_string),
                code: Some("invalid_request_error".to_string()),
            },
        }
    }

    /// Create a service not found error (404).
    pub fn service_not_found(service: &str) -> Self {
        Self {
            error: ApiErrorBody {
                message: format!("Service '{}' not found", service),
                r#type: "invalid_request_error".to_string(),
                param: Some("service".to_string()),
                code: Some("service_not_found".to_string()),
            },
        }
    }

    /// Create a service unavailable error (503).
    pub fn service_unavailable(message: &str) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.to_string(),
                r#type: "server_error".to_string(),
                param: None,
                code: Some("service_unavailable".to_string()),
            },
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.error.code.as_deref() {
            Some("invalid_request_error") => StatusCode::BAD_REQUEST,
            Some("service_not_found") => StatusCode::NOT_FOUND,
            Some("service_unavailable") => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::ShuttingDown => ApiError::service_unavailable(&message),
            PipelineError::UnknownService { .. } => {
                ApiError::invalid_request(&message, Some("service"))
            }
            PipelineError::EmptyPipeline | PipelineError::UnnamedStage { .. } => {
                ApiError::invalid_request(&message, Some("stages"))
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ServiceNotFound(id) => ApiError::service_not_found(&id),
            other => ApiError::bad_request(&other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pipeline_request_deserialize() {
        let request: PipelineRequest = serde_json::from_value(json!({
            "stages": [
                {"name": "draft", "primary": {"service": "writer", "payload": {"topic": "x"}}},
                {"name": "polish", "primary": {"service": "editor"}, "fallback": {"service": "writer"}}
            ],
            "deadline_ms": 5000
        }))
        .unwrap();
        assert_eq!(request.stages.len(), 2);
        assert_eq!(request.deadline_ms, Some(5000));
        assert!(request.stages[1].fallback.is_some());
    }

    #[test]
    fn test_api_error_serialize() {
        let error = ApiError::service_not_found("writer");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"]["type"], "invalid_request_error");
        assert_eq!(json["error"]["code"], "service_not_found");
        assert_eq!(json["error"]["param"], "service");
    }

    #[test]
    fn test_pipeline_error_status_codes() {
        let cases = [
            (PipelineError::EmptyPipeline, StatusCode::BAD_REQUEST),
            (PipelineError::UnnamedStage { index: 0 }, StatusCode::BAD_REQUEST),
            (
                PipelineError::UnknownService {
                    stage: "a".into(),
                    service: "b".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (PipelineError::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_registry_error_maps_to_404() {
        let error = ApiError::from(RegistryError::ServiceNotFound("x".into()));
        assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_api_error_unknown_code_returns_500() {
        let error = ApiError {
            error: ApiErrorBody {
                message: "boom".to_string(),
                r#type: "server_error".to_string(),
                param: None,
                code: None,
            },
        };
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
