//! Domain Entities
//!
//! Core business entities for the admission-control domain.

use crate::domain::value_objects::{ScopeKey, Tier, WindowKind};
use kernel::id::{TenantId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-field replacement of tier defaults for a single tenant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOverrides {
    pub per_minute: Option<u32>,
    pub per_hour: Option<u32>,
    pub per_day: Option<u32>,
    pub max_concurrent: Option<u32>,
}

impl LimitOverrides {
    pub fn is_empty(&self) -> bool {
        self.per_minute.is_none()
            && self.per_hour.is_none()
            && self.per_day.is_none()
            && self.max_concurrent.is_none()
    }
}

/// Limits profile of a tenant: tier defaults plus optional overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantLimitProfile {
    pub tenant_id: TenantId,
    pub tier: Tier,
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
    pub max_concurrent: u32,
    #[serde(default)]
    pub overrides: Option<LimitOverrides>,
    #[serde(default)]
    pub bypass: bool,
}

impl TenantLimitProfile {
    /// Effective request budget for a window, overrides applied
    pub fn effective_limit(&self, kind: WindowKind) -> u32 {
        let overridden = self.overrides.as_ref().and_then(|o| match kind {
            WindowKind::Minute => o.per_minute,
            WindowKind::Hour => o.per_hour,
            WindowKind::Day => o.per_day,
        });
        overridden.unwrap_or(match kind {
            WindowKind::Minute => self.per_minute,
            WindowKind::Hour => self.per_hour,
            WindowKind::Day => self.per_day,
        })
    }

    /// Effective concurrent-connection budget, overrides applied
    pub fn effective_max_concurrent(&self) -> u32 {
        self.overrides
            .as_ref()
            .and_then(|o| o.max_concurrent)
            .unwrap_or(self.max_concurrent)
    }
}

/// One rejected request, recorded for alerting and observability
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationRecord {
    pub id: Uuid,
    pub at_ms: i64,
    pub scope_key: ScopeKey,
    pub tenant_id: Option<TenantId>,
    pub user_id: Option<UserId>,
    /// Counter value observed at rejection time
    pub observed: u64,
    pub limit: u32,
}

impl ViolationRecord {
    pub fn new(
        at_ms: i64,
        scope_key: ScopeKey,
        tenant_id: Option<TenantId>,
        user_id: Option<UserId>,
        observed: u64,
        limit: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            at_ms,
            scope_key,
            tenant_id,
            user_id,
            observed,
            limit,
        }
    }

    /// Key the in-process monitor aggregates this violation under
    pub fn monitor_key(&self) -> String {
        match (&self.tenant_id, &self.user_id) {
            (Some(tenant), Some(user)) => format!("{}:{}", tenant, user),
            (Some(tenant), None) => tenant.to_string(),
            _ => self.scope_key.to_string(),
        }
    }
}

/// Alert raised when a scope keeps violating its limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub at_ms: i64,
    pub monitor_key: String,
    pub tenant_id: Option<TenantId>,
    pub user_id: Option<UserId>,
    /// Violations accumulated since the previous alert
    pub violation_count: u32,
}
