//! Rate-Limit Response Headers
//!
//! Header convention for HTTP-facing integrations: `X-RateLimit-Limit`,
//! `X-RateLimit-Remaining`, `X-RateLimit-Reset` (epoch ms) on every
//! response, plus `Retry-After` (seconds) on rejections.

use crate::application::admission::AdmissionDecision;
use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";
pub const RETRY_AFTER: &str = "retry-after";

/// Apply the rate-limit headers for a decision
pub fn apply_admission_headers(headers: &mut HeaderMap, decision: &AdmissionDecision) {
    insert(headers, X_RATELIMIT_LIMIT, decision.limit.to_string());
    insert(headers, X_RATELIMIT_REMAINING, decision.remaining.to_string());
    insert(headers, X_RATELIMIT_RESET, decision.reset_at_ms.to_string());
    if let Some(secs) = decision.retry_after_secs {
        insert(headers, RETRY_AFTER, secs.to_string());
    }
}

/// Apply just a Retry-After hint
pub fn apply_retry_after(headers: &mut HeaderMap, secs: u64) {
    insert(headers, RETRY_AFTER, secs.to_string());
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}
