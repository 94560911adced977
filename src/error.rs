//! # Error Handling
//!
//! This module defines the HTTP-facing error type and how it's converted to responses.
//!
//! ## Error Layers:
//! - **Client errors** (`CompletionError`, `SpeechError` in `crate::clients`): what went wrong
//!   talking to an upstream provider. These never cross a connection boundary.
//! - **AppError** (this module): what an HTTP handler reports back to the caller.
//! - **anyhow::Error**: startup failures in `main` (bad config, bind errors).
//!
//! ## Why custom errors:
//! The API contract has two distinct failure shapes: "unknown model" is the
//! client's fault (400), while a failing provider is ours (500). Both use the
//! same `{status: "error", error: ...}` body so the frontend can treat them alike.

use crate::clients::CompletionError;
use crate::directory::DirectoryError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **Upstream**: The completion or speech provider failed (500 errors)
/// - **ModelNotFound**: A requested model matched nothing (400 errors)
///
/// ## Usage Example:
/// ```rust,ignore
/// return Err(AppError::ModelNotFound("Model foo not found".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Completion or speech provider call failed
    Upstream(String),

    /// Requested model is neither offered by the provider nor the default
    ModelNotFound(String),
}

impl AppError {
    /// The raw message without the category prefix, as sent to clients.
    pub fn message(&self) -> &str {
        match self {
            AppError::Upstream(msg) | AppError::ModelNotFound(msg) => msg,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Upstream(_) => "upstream_error",
            AppError::ModelNotFound(_) => "model_not_found",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            AppError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
        }
    }
}

/// Converts errors into the JSON body the frontend expects.
///
/// ## JSON Response Format:
/// ```json
/// {
///   "status": "error",
///   "error": "Model foo not found. Available models: models/gemini-pro...",
///   "type": "model_not_found",
///   "timestamp": "2025-01-01T12:00:00Z"
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ModelNotFound(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "status": "error",
            "error": self.message(),
            "type": self.error_type(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }
}

/// Provider failures always surface as 500s; the message is passed through verbatim.
impl From<CompletionError> for AppError {
    fn from(err: CompletionError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Upstream(inner) => inner.into(),
            not_found @ DirectoryError::NotFound { .. } => AppError::ModelNotFound(not_found.to_string()),
        }
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::ModelNotFound("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Upstream("quota".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn test_error_body_shape() {
        let response = AppError::ModelNotFound("Model foo not found".into()).error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "Model foo not found");
        assert_eq!(value["type"], "model_not_found");
    }

    #[actix_web::test]
    async fn test_upstream_body_keeps_provider_message() {
        let response = AppError::Upstream("RESOURCE_EXHAUSTED: quota".into()).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "RESOURCE_EXHAUSTED: quota");
        assert_eq!(value["type"], "upstream_error");
    }

    #[test]
    fn test_completion_error_becomes_upstream() {
        let err: AppError = CompletionError::Api {
            status: 429,
            message: "RESOURCE_EXHAUSTED: quota".into(),
        }
        .into();
        assert!(matches!(err, AppError::Upstream(_)));
        assert!(err.message().contains("quota"));
    }

    #[test]
    fn test_directory_errors_split_by_cause() {
        let not_found: AppError = DirectoryError::NotFound {
            requested: "foo".into(),
            sample: "models/a".into(),
        }
        .into();
        assert_eq!(not_found.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(not_found.message(), "Model foo not found. Available models: models/a...");

        let upstream: AppError = DirectoryError::Upstream(CompletionError::NotConfigured).into();
        assert_eq!(upstream.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
