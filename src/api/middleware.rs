use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Prefix the message with the step that failed, keeping the error kind.
    pub fn context(self, step: impl AsRef<str>) -> Self {
        let step = step.as_ref();
        match self {
            AppError::Settings(msg) => AppError::Settings(format!("{}: {}", step, msg)),
            AppError::Connection(msg) => AppError::Connection(format!("{}: {}", step, msg)),
            AppError::Validation(msg) => AppError::Validation(format!("{}: {}", step, msg)),
            AppError::Parse(msg) => AppError::Parse(format!("{}: {}", step, msg)),
            AppError::Request(msg) => AppError::Request(format!("{}: {}", step, msg)),
            AppError::NotFound(msg) => AppError::NotFound(format!("{}: {}", step, msg)),
            AppError::Internal(msg) => AppError::Internal(format!("{}: {}", step, msg)),
        }
    }

    /// The inner message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            AppError::Settings(msg)
            | AppError::Connection(msg)
            | AppError::Validation(msg)
            | AppError::Parse(msg)
            | AppError::Request(msg)
            | AppError::NotFound(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match self {
            AppError::Settings(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("SETTINGS_ERROR", msg)
                    .with_details("Check the datasource configuration (URL, default project, authentication)."),
            ),
            AppError::Connection(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new("CONNECTION_ERROR", msg),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg),
            ),
            AppError::Parse(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("PARSE_ERROR", msg),
            ),
            AppError::Request(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new("REQUEST_ERROR", msg),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", msg),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_detail,
        });

        (status, body).into_response()
    }
}

/// Convert anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_format() {
        let error = AppError::NotFound("Datasource not found".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let response = AppError::Validation("missing required arguments".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::Parse("isOrderable".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_context_keeps_kind() {
        let err = AppError::Connection("dial tcp: refused".to_string())
            .context("Failed to create http client");
        assert!(matches!(err, AppError::Connection(_)));
        assert_eq!(err.message(), "Failed to create http client: dial tcp: refused");
    }

    #[test]
    fn test_error_detail_creation() {
        let detail = ErrorDetail::new("TEST_CODE", "Test message");
        assert_eq!(detail.code, "TEST_CODE");
        assert_eq!(detail.message, "Test message");
        assert!(detail.details.is_none());
    }
}
