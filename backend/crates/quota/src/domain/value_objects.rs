//! Domain Value Objects
//!
//! Immutable value types for the admission-control domain.

use crate::error::{QuotaError, QuotaResult};
use kernel::id::TenantId;
use serde::{Deserialize, Serialize};

/// Subscription tier of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
    Enterprise,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Free
    }
}

/// Scope key identifying what a counter counts, e.g. `acme:/clients`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey(String);

impl ScopeKey {
    /// Create a scope key from an opaque non-empty string
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() || value.len() > 512 {
            return None;
        }
        Some(Self(value))
    }

    /// Scope key for a tenant + route pair
    pub fn for_route(tenant_id: &TenantId, route: &str) -> Self {
        Self(format!("{}:{}", tenant_id, route))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the three fixed windows the progressive limiter evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Minute,
    Hour,
    Day,
}

impl WindowKind {
    pub const ALL: [WindowKind; 3] = [WindowKind::Minute, WindowKind::Hour, WindowKind::Day];

    pub const fn window_ms(&self) -> i64 {
        match self {
            WindowKind::Minute => 60_000,
            WindowKind::Hour => 3_600_000,
            WindowKind::Day => 86_400_000,
        }
    }

    pub fn from_window_ms(window_ms: i64) -> Option<Self> {
        match window_ms {
            60_000 => Some(WindowKind::Minute),
            3_600_000 => Some(WindowKind::Hour),
            86_400_000 => Some(WindowKind::Day),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Minute => "minute",
            WindowKind::Hour => "hour",
            WindowKind::Day => "day",
        }
    }
}

/// A fixed-window rate limit policy
///
/// Invariants: `window_ms >= 1000`, `max_requests >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    window_ms: i64,
    max_requests: u32,
}

impl RateLimitPolicy {
    /// Minimum accepted window size
    pub const MIN_WINDOW_MS: i64 = 1000;

    pub fn new(window_ms: i64, max_requests: u32) -> QuotaResult<Self> {
        if window_ms < Self::MIN_WINDOW_MS {
            return Err(QuotaError::InvalidPolicy(format!(
                "window must be at least {}ms, got {}ms",
                Self::MIN_WINDOW_MS,
                window_ms
            )));
        }
        if max_requests == 0 {
            return Err(QuotaError::InvalidPolicy(
                "max_requests must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            window_ms,
            max_requests,
        })
    }

    /// Policy for one of the progressive windows; valid by construction
    pub fn for_window(kind: WindowKind, max_requests: u32) -> Self {
        Self {
            window_ms: kind.window_ms(),
            max_requests: max_requests.max(1),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Replace the request budget, keeping the window
    pub fn with_max_requests(self, max_requests: u32) -> Self {
        Self {
            max_requests: max_requests.max(1),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_constraints() {
        assert!(RateLimitPolicy::new(999, 10).is_err());
        assert!(RateLimitPolicy::new(1000, 0).is_err());
        let policy = RateLimitPolicy::new(60_000, 60).unwrap();
        assert_eq!(policy.window_ms(), 60_000);
        assert_eq!(policy.max_requests(), 60);
    }

    #[test]
    fn test_window_kind_round_trip() {
        for kind in WindowKind::ALL {
            assert_eq!(WindowKind::from_window_ms(kind.window_ms()), Some(kind));
        }
        assert_eq!(WindowKind::from_window_ms(1234), None);
    }

    #[test]
    fn test_scope_key() {
        assert!(ScopeKey::new("").is_none());
        let tenant = TenantId::parse("acme").unwrap();
        let scope = ScopeKey::for_route(&tenant, "/clients");
        assert_eq!(scope.as_str(), "acme:/clients");
    }
}
