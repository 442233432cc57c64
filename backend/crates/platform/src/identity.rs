//! Client identity extraction
//!
//! Common functions for identifying the calling tenant, user and connection
//! via HTTP headers. The gateway in front of this service authenticates the
//! request and forwards the resolved principals as headers; this module only
//! parses and validates them.

use axum::http::HeaderMap;
use kernel::id::{ConnectionId, TenantId, UserId};
use std::net::IpAddr;

/// Header carrying the authenticated tenant id
pub const TENANT_HEADER: &str = "x-tenant-id";
/// Header carrying the authenticated user id
pub const USER_HEADER: &str = "x-user-id";
/// Header carrying the client connection id (websocket/streaming sessions)
pub const CONNECTION_HEADER: &str = "x-connection-id";

/// Request identity resolved from forwarded headers
///
/// Used to scope admission decisions and connection tracking.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub tenant_id: TenantId,
    pub user_id: Option<UserId>,
    pub connection_id: Option<ConnectionId>,
    /// Client IP address (from X-Forwarded-For or direct connection)
    pub client_ip: Option<IpAddr>,
}

/// Error when extracting request identity
#[derive(Debug, Clone, thiserror::Error)]
pub enum IdentityError {
    #[error("Missing required header: {0}")]
    MissingHeader(String),
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

/// Extract the request identity from forwarded headers
///
/// The tenant header is required; user and connection headers are optional.
///
/// ## Arguments
/// * `headers` - HTTP request headers
/// * `client_ip` - Client IP address (from connection or X-Forwarded-For)
///
/// ## Returns
/// * `Ok(RequestIdentity)` - Successfully extracted identity
/// * `Err(IdentityError)` - Missing or malformed tenant/user/connection header
pub fn extract_identity(
    headers: &HeaderMap,
    client_ip: Option<IpAddr>,
) -> Result<RequestIdentity, IdentityError> {
    let tenant_raw = headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| IdentityError::MissingHeader(TENANT_HEADER.to_string()))?;

    let tenant_id = TenantId::parse(tenant_raw)
        .ok_or_else(|| IdentityError::InvalidHeader(TENANT_HEADER.to_string()))?;

    let user_id = match headers.get(USER_HEADER).and_then(|v| v.to_str().ok()) {
        Some(raw) => Some(
            UserId::parse(raw).ok_or_else(|| IdentityError::InvalidHeader(USER_HEADER.to_string()))?,
        ),
        None => None,
    };

    let connection_id = match headers.get(CONNECTION_HEADER).and_then(|v| v.to_str().ok()) {
        Some(raw) => Some(
            ConnectionId::parse(raw)
                .ok_or_else(|| IdentityError::InvalidHeader(CONNECTION_HEADER.to_string()))?,
        ),
        None => None,
    };

    Ok(RequestIdentity {
        tenant_id,
        user_id,
        connection_id,
        client_ip,
    })
}

/// Extract client IP address from headers
///
/// Checks X-Forwarded-For header first (for reverse proxy setups),
/// then falls back to direct connection IP.
pub fn extract_client_ip(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Option<IpAddr> {
    // Check X-Forwarded-For header (first IP in the list)
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first_ip) = xff.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    direct_ip
}
