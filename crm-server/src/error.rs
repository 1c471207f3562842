//! Domain error taxonomy and the single HTTP responder for it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors raised by core operations and forwarded to the HTTP boundary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input, duplicate segment name.
    #[error("{0}")]
    Validation(String),

    /// Unknown segment, customer or order.
    #[error("{0}")]
    NotFound(String),

    /// Unique constraint on an ingested document, e.g. customer email.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Receipt for a correlation key no dispatch ever recorded.
    /// Answered with 400 rather than 404.
    #[error("Communication log not found for vendor message ID {0}")]
    UnknownReceipt(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::UnknownReceipt(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub msg: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = if status.is_server_error() {
            error!(error = %self, status_code = status.as_u16(), "request_failed");
            ErrorResponse {
                status: "error",
                msg: "Something went wrong, please try again later".to_string(),
            }
        } else {
            ErrorResponse {
                status: "fail",
                msg: self.to_string(),
            }
        };

        (status, Json(body)).into_response()
    }
}
