//! Store Traits
//!
//! Interfaces for the shared quota store and external ports.
//! Implementations live in the infrastructure layer.

use crate::domain::entities::{Alert, TenantLimitProfile};
use crate::error::QuotaResult;
use kernel::id::TenantId;

/// Shared key-value store backing counters, connection sets and flags.
///
/// In a horizontally scaled deployment this store is the only
/// cross-instance serialization point; `increment_window` must be a single
/// atomic operation against it.
#[trait_variant::make(QuotaStore: Send)]
pub trait LocalQuotaStore {
    /// Atomically increment a window counter and (re)set its expiry.
    /// Returns the counter value after the increment.
    async fn increment_window(&self, key: &str, expire_ms: i64) -> QuotaResult<u64>;

    /// Add a connection member with its own expiry timestamp, prune members
    /// expired at `now_ms`, and refresh the set's key TTL.
    /// Returns the live member count after the add.
    async fn add_connection(
        &self,
        set_key: &str,
        member: &str,
        expires_at_ms: i64,
        now_ms: i64,
        key_ttl_ms: i64,
    ) -> QuotaResult<u64>;

    /// Remove a connection member (graceful disconnect or rejected add)
    async fn remove_connection(&self, set_key: &str, member: &str) -> QuotaResult<()>;

    /// Count live connection members after pruning expired ones
    async fn connection_count(&self, set_key: &str, now_ms: i64) -> QuotaResult<u64>;

    /// Set or clear a boolean flag, optionally with a TTL
    async fn set_flag(&self, key: &str, value: bool, ttl_ms: Option<i64>) -> QuotaResult<()>;

    /// Read a boolean flag; absent keys read as `false`
    async fn get_flag(&self, key: &str) -> QuotaResult<bool>;

    /// Append a violation payload to a bounded, TTL-expiring list
    async fn record_violation(
        &self,
        key: &str,
        payload: &str,
        keep: usize,
        ttl_ms: i64,
    ) -> QuotaResult<()>;
}

/// External subscription service owning tenant policies.
///
/// This core caches, but does not own, that data.
#[trait_variant::make(TenantPolicySource: Send)]
pub trait LocalTenantPolicySource {
    /// Fetch the limits profile for a tenant; `None` for unknown tenants
    async fn get_tenant_policy(
        &self,
        tenant_id: &TenantId,
    ) -> QuotaResult<Option<TenantLimitProfile>>;
}

/// External notification sink for repeated-violation alerts.
///
/// Emission is best-effort; implementations log their own failures.
#[trait_variant::make(AlertSink: Send)]
pub trait LocalAlertSink {
    async fn emit_alert(&self, alert: Alert);
}
