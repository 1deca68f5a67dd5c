//! Error types for Libris server

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes carried in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    Forbidden = 3,
    DbFailure = 4,
    NoSuchBook = 5,
    InvalidTransition = 6,
    Busy = 7,
    BadValue = 8,
    CatalogFailure = 9,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// No credential, or one that does not validate
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Valid identity without the required privilege
    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested transition is invalid for the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The per-ISBN section could not be acquired in time
    #[error("Busy: {0}")]
    Busy(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Only `Busy` is safe to retry without caller involvement.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Busy(_))
    }

    /// True for failures of the durable store.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Storage(_))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::Forbidden, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchBook, msg.clone())
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::InvalidTransition, msg.clone())
            }
            AppError::Busy(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::Busy, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Storage failure".to_string(),
                )
            }
            AppError::Catalog(msg) => {
                (StatusCode::BAD_GATEWAY, ErrorCode::CatalogFailure, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        let mut response = (status, body).into_response();
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
