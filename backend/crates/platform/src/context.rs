//! Strongly-typed request context
//!
//! One value carrying everything the admission and caching stages need to
//! know about the request in flight. Built once at the edge and passed by
//! reference through each stage, instead of ad-hoc lookups against raw
//! request parts.

use crate::identity::{self, IdentityError, RequestIdentity};
use axum::http::{HeaderMap, Method};
use std::net::IpAddr;

/// Per-request context threaded through admission and cache stages
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: RequestIdentity,
    pub method: Method,
    /// Normalized route path, e.g. `/clients/c1`
    pub route: String,
    /// Query parameters in arrival order (canonicalized downstream)
    pub query: Vec<(String, String)>,
    pub received_at_ms: i64,
}

impl RequestContext {
    /// Build the context from request parts.
    ///
    /// Fails only on identity extraction (missing/invalid tenant header).
    pub fn from_parts(
        headers: &HeaderMap,
        method: Method,
        path: &str,
        raw_query: Option<&str>,
        direct_ip: Option<IpAddr>,
        received_at_ms: i64,
    ) -> Result<Self, IdentityError> {
        let client_ip = identity::extract_client_ip(headers, direct_ip);
        let identity = identity::extract_identity(headers, client_ip)?;
        Ok(Self {
            identity,
            method,
            route: normalize_route(path),
            query: parse_query(raw_query.unwrap_or("")),
            received_at_ms,
        })
    }
}

/// Normalize a route path: ensure a leading slash, strip trailing slashes.
pub fn normalize_route(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Parse a raw query string into key/value pairs.
///
/// Values keep their transport encoding; canonicalization happens in the
/// fingerprint, which only requires consistency, not decoding.
pub fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (part.to_string(), String::new()),
        })
        .collect()
}
