//! API DTOs (Data Transfer Objects)

use serde::{Deserialize, Serialize};

/// Body of a 429 throttling response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleResponse {
    /// `quota_exceeded` or `connection_limit_exceeded`
    pub error: &'static str,
    pub message: String,
    pub retry_after_seconds: u64,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

impl ThrottleResponse {
    pub fn quota_exceeded(retry_after_seconds: u64, limit: u32, reset_at_ms: i64) -> Self {
        Self {
            error: "quota_exceeded",
            message: format!(
                "Request quota exceeded; retry in {} seconds",
                retry_after_seconds
            ),
            retry_after_seconds,
            limit,
            remaining: 0,
            reset_at_ms,
        }
    }

    pub fn connection_limit_exceeded(retry_after_seconds: u64, limit: u32) -> Self {
        Self {
            error: "connection_limit_exceeded",
            message: format!(
                "Concurrent connection limit of {} reached; retry in {} seconds",
                limit, retry_after_seconds
            ),
            retry_after_seconds,
            limit,
            remaining: 0,
            reset_at_ms: 0,
        }
    }
}

/// Request body for the tenant bypass admin endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BypassRequest {
    pub enabled: bool,
}
