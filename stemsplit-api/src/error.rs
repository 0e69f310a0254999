//! Error types for stemsplit-api
//!
//! Every failure reaching the request boundary becomes a JSON body
//! `{"error": ..., "code": ..., "details": ...}`; `details` is present only
//! when there is diagnostic text worth returning.

use crate::services::{CatalogError, EngineError, PipelineError, StorageError, ValidationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Upload rejected before touching storage (400)
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Multipart body could not be parsed (400)
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    /// Body exceeded the configured limit (413)
    #[error("File too large. Maximum file size is {limit_mb}MB.")]
    PayloadTooLarge { limit_mb: u64 },

    /// Engine failed to launch or exited non-zero (500)
    #[error("Demucs processing failed")]
    EngineExecution(String),

    /// Engine exceeded its wall-clock bound (504)
    #[error("Processing timeout - file too large or server busy")]
    EngineTimeout(String),

    /// Engine exited cleanly but produced no stems (500)
    #[error("Separation did not produce output")]
    OutputMissing(String),

    /// Unexpected filesystem failure (500)
    #[error("Storage error")]
    Storage(String),

    /// Requested artifact absent (404)
    #[error("File not found")]
    NotFound(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::EngineTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::EngineExecution(_) | ApiError::OutputMissing(_) | ApiError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(reason) => reason.reason(),
            ApiError::MalformedUpload(_) => "malformed-upload",
            ApiError::PayloadTooLarge { .. } => "payload-too-large",
            ApiError::EngineExecution(_) => "engine-failed",
            ApiError::EngineTimeout(_) => "engine-timeout",
            ApiError::OutputMissing(_) => "output-missing",
            ApiError::Storage(_) => "storage-error",
            ApiError::NotFound(_) => "not-found",
        }
    }

    fn details(&self) -> Option<&str> {
        match self {
            ApiError::MalformedUpload(d)
            | ApiError::EngineExecution(d)
            | ApiError::EngineTimeout(d)
            | ApiError::OutputMissing(d) => Some(d.as_str()),
            // Storage paths and probed URLs stay in the logs
            ApiError::Storage(_)
            | ApiError::NotFound(_)
            | ApiError::Validation(_)
            | ApiError::PayloadTooLarge { .. } => None,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::TimedOut(_) => ApiError::EngineTimeout(err.details()),
            EngineError::Spawn { .. } | EngineError::Failed { .. } => {
                ApiError::EngineExecution(err.details())
            }
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::OutputMissing(_) => ApiError::OutputMissing(
                "separation engine exited successfully but wrote no stems".to_string(),
            ),
            CatalogError::Io(msg) => ApiError::Storage(msg),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Storage(e) => e.into(),
            PipelineError::Engine(e) => e.into(),
            PipelineError::Catalog(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ApiError::Storage(msg) => tracing::error!(error = %msg, "Storage failure"),
            ApiError::NotFound(path) => tracing::warn!(path = %path, "File not found"),
            other if status.is_server_error() => tracing::error!(error = ?other, "Request failed"),
            other => tracing::warn!(error = %other, "Request rejected"),
        }

        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let Some(details) = self.details() {
            body["details"] = json!(details);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// JSON body for panics caught by the last-resort layer
pub fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Internal server error",
            "code": "internal-error",
        })),
    )
        .into_response()
}
