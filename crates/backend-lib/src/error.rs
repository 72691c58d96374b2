// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use livepoll_common::FieldError;
use thiserror::Error;

use crate::store::StoreError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Poll not found")]
    PollNotFound,

    #[error("Option not found for this poll")]
    OptionNotFound,

    #[error("Duplicate vote")]
    AlreadyVoted,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Single-field validation failure.
    pub fn invalid(field: &str, message: &str) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PollNotFound | AppError::OptionNotFound => StatusCode::NOT_FOUND,
            AppError::AlreadyVoted => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VAL_001",
            AppError::PollNotFound => "POLL_001",
            AppError::OptionNotFound => "POLL_002",
            AppError::AlreadyVoted => "VOTE_001",
            AppError::Json(_) => "JSON_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Validation(_) => "Validation error".to_string(),
            AppError::PollNotFound => "Poll not found".to_string(),
            AppError::OptionNotFound => "Option not found for this poll".to_string(),
            AppError::AlreadyVoted => "You have already voted in this poll".to_string(),
            AppError::Json(_) => "Invalid request format".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let mut error = serde_json::json!({
            "code": error_code,
            "message": message,
        });

        // Field-level detail is safe to expose in any build
        if let AppError::Validation(fields) = &self {
            error["details"] = serde_json::json!(fields);
        }

        let body = serde_json::json!({
            "success": false,
            "error": error,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PollNotFound => AppError::PollNotFound,
            StoreError::OptionNotFound => AppError::OptionNotFound,
            // Callers that care translate this before converting; a
            // stray conversion still reports the conflict, not a 500.
            StoreError::UniqueViolation => AppError::AlreadyVoted,
            StoreError::Backend(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for AppError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        AppError::Internal("Failed to send message".to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}
