//! Application Configuration
//!
//! Configuration for the admission-control layer: tier defaults, key
//! layout in the shared store, violation alerting and outage policy.

use crate::domain::value_objects::{ScopeKey, Tier};
use kernel::id::TenantId;
use std::time::Duration;

/// Request and connection budgets of one tier
#[derive(Debug, Clone, Copy)]
pub struct TierLimits {
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
    pub max_concurrent: u32,
}

/// Admission-control configuration
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Prefix for every key this layer writes to the shared store
    pub key_prefix: String,
    pub free: TierLimits,
    pub pro: TierLimits,
    pub enterprise: TierLimits,
    /// Per-connection TTL; refreshed on every check (heartbeat)
    pub connection_ttl: Duration,
    /// Extra counter lifetime past the window end, covers boundary reads
    pub counter_expiry_slack: Duration,
    /// Violations before an alert fires
    pub violation_threshold: u32,
    /// Minimum gap between alerts for one scope
    pub alert_interval: Duration,
    /// TTL of the per-tenant violation list in the shared store
    pub violation_retention: Duration,
    /// Violations kept per tenant in the shared store
    pub violation_keep: usize,
    /// Maximum scopes tracked by the in-process violation monitor
    pub monitor_capacity: usize,
    /// TTL of the in-process tenant profile cache
    pub profile_cache_ttl: Duration,
    /// Maximum tenants kept in the in-process profile cache
    pub profile_cache_capacity: usize,
    /// Store-outage policy for the admission path: `true` admits when the
    /// store cannot be reached, `false` rejects with 503. One policy for
    /// every admission path.
    pub fail_open: bool,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            key_prefix: "ql".to_string(),
            free: TierLimits {
                per_minute: 60,
                per_hour: 1_000,
                per_day: 10_000,
                max_concurrent: 10,
            },
            pro: TierLimits {
                per_minute: 600,
                per_hour: 20_000,
                per_day: 200_000,
                max_concurrent: 50,
            },
            enterprise: TierLimits {
                per_minute: 6_000,
                per_hour: 200_000,
                per_day: 2_000_000,
                max_concurrent: 200,
            },
            connection_ttl: Duration::from_secs(30),
            counter_expiry_slack: Duration::from_secs(60),
            violation_threshold: 10,
            alert_interval: Duration::from_secs(300),
            violation_retention: Duration::from_secs(3600),
            violation_keep: 100,
            monitor_capacity: 10_000,
            profile_cache_ttl: Duration::from_secs(60),
            profile_cache_capacity: 10_000,
            fail_open: true,
        }
    }
}

impl QuotaConfig {
    pub fn tier_limits(&self, tier: Tier) -> &TierLimits {
        match tier {
            Tier::Free => &self.free,
            Tier::Pro => &self.pro,
            Tier::Enterprise => &self.enterprise,
        }
    }

    pub fn connection_ttl_ms(&self) -> i64 {
        self.connection_ttl.as_millis() as i64
    }

    pub fn counter_expiry_slack_ms(&self) -> i64 {
        self.counter_expiry_slack.as_millis() as i64
    }

    pub fn alert_interval_ms(&self) -> i64 {
        self.alert_interval.as_millis() as i64
    }

    pub fn violation_retention_ms(&self) -> i64 {
        self.violation_retention.as_millis() as i64
    }

    pub fn profile_cache_ttl_ms(&self) -> i64 {
        self.profile_cache_ttl.as_millis() as i64
    }

    // ========================================================================
    // Store key layout
    // ========================================================================

    /// Counter key for one (scope, window) pair. The window start is part of
    /// the key, so a new window always starts from a fresh counter.
    pub fn counter_key(&self, scope: &ScopeKey, window_ms: i64, window_start_ms: i64) -> String {
        format!(
            "{}:cnt:{}:{}:{}",
            self.key_prefix, scope, window_ms, window_start_ms
        )
    }

    pub fn tenant_connections_key(&self, tenant_id: &TenantId) -> String {
        format!("{}:conn:t:{}", self.key_prefix, tenant_id)
    }

    pub fn user_connections_key(&self, tenant_id: &TenantId, user_id: &kernel::id::UserId) -> String {
        format!("{}:conn:u:{}:{}", self.key_prefix, tenant_id, user_id)
    }

    pub fn bypass_key(&self, tenant_id: &TenantId) -> String {
        format!("{}:bypass:{}", self.key_prefix, tenant_id)
    }

    pub fn violations_key(&self, tenant_id: &TenantId) -> String {
        format!("{}:viol:{}", self.key_prefix, tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_key_layout() {
        let config = QuotaConfig::default();
        let scope = ScopeKey::new("acme:/list").unwrap();
        assert_eq!(
            config.counter_key(&scope, 60_000, 120_000),
            "ql:cnt:acme:/list:60000:120000"
        );
    }

    #[test]
    fn test_tier_limits_lookup() {
        let config = QuotaConfig::default();
        assert_eq!(config.tier_limits(Tier::Free).per_minute, 60);
        assert_eq!(config.tier_limits(Tier::Pro).per_minute, 600);
        assert_eq!(config.tier_limits(Tier::Enterprise).per_minute, 6_000);
    }
}
