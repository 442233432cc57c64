//! Cache Error Types
//!
//! Cache errors stay inside this layer: public operations degrade (miss,
//! skipped invalidation, retained stale entry) instead of propagating to
//! end users. The variants exist so the degradation sites can tell a store
//! outage from a corrupt entry.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Cache-specific result type alias
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific error variants
#[derive(Debug, Error)]
pub enum CacheError {
    /// The shared store could not be reached
    #[error("Cache store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored entry could not be parsed; the entry is deleted to self-heal
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Background recomputation failed; the stale entry is retained
    #[error("Recomputation failed: {0}")]
    Recomputation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CacheError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Serialization(_)
            | CacheError::Recomputation(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::StoreUnavailable(_) => ErrorKind::ServiceUnavailable,
            CacheError::Serialization(_)
            | CacheError::Recomputation(_)
            | CacheError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    fn log(&self) {
        match self {
            CacheError::StoreUnavailable(msg) => {
                tracing::warn!(message = %msg, "Cache store unavailable");
            }
            CacheError::Serialization(e) => {
                tracing::warn!(error = %e, "Cache entry serialization error");
            }
            CacheError::Recomputation(msg) => {
                tracing::warn!(message = %msg, "Cache recomputation failed");
            }
            CacheError::Internal(msg) => {
                tracing::error!(message = %msg, "Cache internal error");
            }
        }
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::StoreUnavailable(err.to_string())
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::new(err.kind(), err.to_string())
    }
}

impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        (status, ()).into_response()
    }
}
