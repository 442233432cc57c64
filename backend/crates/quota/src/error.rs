//! Quota Error Types
//!
//! This module provides admission-control error variants that integrate
//! with the unified `kernel::error::AppError` system.
//!
//! Quota rejections are NOT errors: `checkAdmission` returns a structured
//! decision either way. Errors here are infrastructure failures, so callers
//! can make an explicit fail-open/fail-closed choice.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Quota-specific result type alias
pub type QuotaResult<T> = Result<T, QuotaError>;

/// Quota-specific error variants
#[derive(Debug, Error)]
pub enum QuotaError {
    /// The shared store could not be reached; admission outcome is unknown
    #[error("Quota store unavailable: {0}")]
    StoreUnavailable(String),

    /// Rate limit policy violates its constraints (window >= 1s, limit >= 1)
    #[error("Invalid rate limit policy: {0}")]
    InvalidPolicy(String),

    /// Stored payload could not be serialized/deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuotaError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            QuotaError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            QuotaError::InvalidPolicy(_)
            | QuotaError::Serialization(_)
            | QuotaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuotaError::StoreUnavailable(_) => ErrorKind::ServiceUnavailable,
            QuotaError::InvalidPolicy(_)
            | QuotaError::Serialization(_)
            | QuotaError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            QuotaError::StoreUnavailable(msg) => {
                tracing::error!(message = %msg, "Quota store unavailable");
            }
            QuotaError::InvalidPolicy(msg) => {
                tracing::error!(message = %msg, "Invalid rate limit policy");
            }
            QuotaError::Serialization(e) => {
                tracing::error!(error = %e, "Quota serialization error");
            }
            QuotaError::Internal(msg) => {
                tracing::error!(message = %msg, "Quota internal error");
            }
        }
    }
}

impl From<redis::RedisError> for QuotaError {
    fn from(err: redis::RedisError) -> Self {
        QuotaError::StoreUnavailable(err.to_string())
    }
}

impl From<QuotaError> for AppError {
    fn from(err: QuotaError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        AppError::new(kind, message)
    }
}

impl IntoResponse for QuotaError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        // Return empty body (don't leak store details)
        (status, ()).into_response()
    }
}
