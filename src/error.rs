//! Common error types for the image edit server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Model is not ready")]
    NotReady,

    #[error("Inference failed: {0}")]
    Infer(String),

    #[error("Request queue is full")]
    QueueFull,

    #[error("Request queue is not accepting jobs")]
    QueueClosed,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response format (OpenAI compatible)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_json")),
            AppError::ModelLoad(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", Some("model_load_failed")),
            AppError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "server_error", Some("model_not_ready")),
            AppError::Infer(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", Some("inference_failed")),
            AppError::QueueFull => (StatusCode::SERVICE_UNAVAILABLE, "server_error", Some("queue_full")),
            AppError::QueueClosed => (StatusCode::SERVICE_UNAVAILABLE, "server_error", Some("shutting_down")),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
