//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for server operations
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("No ingestion strategy for routing key: {0}")]
    NoStrategy(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Whether this failure is terminal for the file being processed.
    ///
    /// Terminal failures are routing/configuration problems that retrying
    /// cannot fix; the job layer logs them and does not re-run the work.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_) | AppError::UnknownDataset(_) | AppError::NoStrategy(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "A database error occurred".to_string())
            },
            AppError::NotFound(ref message) => (StatusCode::NOT_FOUND, message.clone()),
            AppError::UnknownDataset(ref name) => {
                (StatusCode::BAD_REQUEST, format!("Unknown dataset: {}", name))
            },
            AppError::NoStrategy(ref key) => (
                StatusCode::BAD_REQUEST,
                format!("No ingestion strategy for routing key: {}", key),
            ),
            AppError::Storage(ref message) => {
                tracing::error!("Storage error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "A storage error occurred".to_string())
            },
            AppError::Queue(ref message) => {
                tracing::error!("Queue error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "A queue error occurred".to_string())
            },
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message.clone())
            },
            AppError::Config(ref message) => {
                tracing::error!("Configuration error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error".to_string())
            },
            AppError::Io(ref e) => {
                tracing::error!("IO error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "An IO error occurred".to_string())
            },
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_errors_not_retryable() {
        assert!(AppError::NotFound("artifact 42".into()).is_terminal());
        assert!(AppError::UnknownDataset("dental".into()).is_terminal());
        assert!(AppError::NoStrategy("unknown/x.csv".into()).is_terminal());
    }

    #[test]
    fn test_transient_errors_retryable() {
        assert!(!AppError::Storage("connection reset".into()).is_terminal());
        assert!(!AppError::Queue("timeout".into()).is_terminal());
        assert!(!AppError::Internal("boom".into()).is_terminal());
    }
}
