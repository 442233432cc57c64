//! Domain Value Objects
//!
//! Immutable value types for the response-cache domain.

use serde::{Deserialize, Serialize};

/// Deterministic identifier for a logical request.
///
/// The printable form is `<sanitized route>:<digest>`; keeping the route in
/// the identifier lets coarse pattern invalidation target entity-scoped
/// keys without an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub(crate) fn from_route_digest(route: &str, digest: &str) -> Self {
        let sanitized = sanitize_route(route);
        Self(format!("{}:{}", sanitized, digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Route rendered as a store-key segment: `/clients/c1` -> `clients:c1`
fn sanitize_route(route: &str) -> String {
    let trimmed = route.trim_matches('/');
    if trimmed.is_empty() {
        return "root".to_string();
    }
    trimmed
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(":")
}

/// Freshness classification of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `age < ttl`: serve as-is
    Fresh,
    /// `ttl <= age < ttl + staleWindow`: serve and refresh in background
    Stale,
    /// Past the stale window: treat as a miss
    Expired,
}

/// How a lookup was answered, reported via `X-Cache`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Stale,
    Miss,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "HIT",
            CacheOutcome::Stale => "STALE",
            CacheOutcome::Miss => "MISS",
        }
    }
}

/// Conditional-request validators of a stored entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    /// Content-hash ETag, stored quoted
    pub etag: String,
    pub last_modified_ms: i64,
}
