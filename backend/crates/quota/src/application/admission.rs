//! Admission Use Cases
//!
//! Single-window checks, the progressive multi-window check, and
//! concurrent-connection admission. Every outcome is a structured decision;
//! only store failures surface as errors so the caller can apply its
//! fail-open/fail-closed policy.

use crate::application::config::QuotaConfig;
use crate::application::tier_resolver::TierPolicyResolver;
use crate::application::violations::ViolationMonitor;
use crate::domain::entities::ViolationRecord;
use crate::domain::repository::{AlertSink, QuotaStore, TenantPolicySource};
use crate::domain::services;
use crate::domain::value_objects::{RateLimitPolicy, ScopeKey, WindowKind};
use crate::error::QuotaResult;
use kernel::id::{ConnectionId, TenantId, UserId};
use platform::clock::Clock;
use std::sync::Arc;

/// Outcome of one fixed-window admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub limit: u32,
    /// Counter value after this check's increment
    pub current: u64,
    pub remaining: u32,
    /// Instant the window resets, epoch ms
    pub reset_at_ms: i64,
    /// Positive retry hint, present only on rejection
    pub retry_after_secs: Option<u64>,
}

impl AdmissionDecision {
    /// Decision for a bypassed tenant: admitted, nothing counted
    fn bypassed(policy: &RateLimitPolicy, now_ms: i64) -> Self {
        Self {
            allowed: true,
            limit: policy.max_requests(),
            current: 0,
            remaining: policy.max_requests(),
            reset_at_ms: services::reset_at_ms(now_ms, policy.window_ms()),
            retry_after_secs: None,
        }
    }
}

/// Outcome of the progressive three-window check.
///
/// The minute window's numbers are the representative result even when an
/// hour/day window caused the rejection; callers needing the binding window
/// inspect `hour`/`day` directly.
#[derive(Debug, Clone)]
pub struct ProgressiveDecision {
    pub allowed: bool,
    /// Worst usage level across windows: 0 (quiet) to 3 (near limit)
    pub warning_level: u8,
    pub minute: AdmissionDecision,
    pub hour: AdmissionDecision,
    pub day: AdmissionDecision,
}

impl ProgressiveDecision {
    /// Minute-window numbers, kept as the reported result for header
    /// compatibility with existing clients
    pub fn representative(&self) -> &AdmissionDecision {
        &self.minute
    }

    /// Retry hint from whichever window rejected, preferring the shortest
    pub fn retry_after_secs(&self) -> Option<u64> {
        [&self.minute, &self.hour, &self.day]
            .iter()
            .filter_map(|d| d.retry_after_secs)
            .min()
    }
}

/// Outcome of a concurrent-connection admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDecision {
    pub allowed: bool,
    pub limit: u32,
    /// Live connections counted against the tenant after this check
    pub active: u64,
    pub retry_after_secs: Option<u64>,
}

/// Admission Controller
///
/// All shared mutable state lives in the store or in per-instance injected
/// containers; the controller itself holds no locks across checks.
pub struct AdmissionController<S, P, A>
where
    S: QuotaStore,
    P: TenantPolicySource,
    A: AlertSink,
{
    store: Arc<S>,
    resolver: Arc<TierPolicyResolver<P, S>>,
    monitor: Arc<ViolationMonitor>,
    alert_sink: Arc<A>,
    config: Arc<QuotaConfig>,
    clock: Clock,
}

impl<S, P, A> AdmissionController<S, P, A>
where
    S: QuotaStore + Send + Sync + 'static,
    P: TenantPolicySource + Send + Sync + 'static,
    A: AlertSink + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<S>,
        resolver: Arc<TierPolicyResolver<P, S>>,
        monitor: Arc<ViolationMonitor>,
        alert_sink: Arc<A>,
        config: Arc<QuotaConfig>,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            resolver,
            monitor,
            alert_sink,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Check one scope against one fixed-window policy.
    ///
    /// Increments the counter exactly once whatever the outcome; the request
    /// that reaches the limit exactly is still admitted, the next one is
    /// rejected. When a tenant is known, its per-window overrides replace
    /// the matching field of the base policy.
    pub async fn check_admission(
        &self,
        scope: &ScopeKey,
        policy: &RateLimitPolicy,
        tenant_id: Option<&TenantId>,
        user_id: Option<&UserId>,
    ) -> QuotaResult<AdmissionDecision> {
        if let Some(tenant) = tenant_id {
            if self.resolver.is_bypassed(tenant).await {
                return Ok(AdmissionDecision::bypassed(policy, self.clock.now_ms()));
            }
            let profile = self.resolver.profile(tenant).await;
            let effective = services::resolve_effective_limit(policy, &profile);
            return self
                .check_window(scope, &effective, tenant_id, user_id)
                .await;
        }
        self.check_window(scope, policy, tenant_id, user_id).await
    }

    /// Check one scope against the tenant's minute, hour and day budgets
    /// concurrently; `allowed` is the AND of all three.
    pub async fn check_progressive(
        &self,
        scope: &ScopeKey,
        tenant_id: &TenantId,
        user_id: Option<&UserId>,
    ) -> QuotaResult<ProgressiveDecision> {
        let profile = self.resolver.profile(tenant_id).await;

        let minute_policy =
            RateLimitPolicy::for_window(WindowKind::Minute, profile.effective_limit(WindowKind::Minute));
        let hour_policy =
            RateLimitPolicy::for_window(WindowKind::Hour, profile.effective_limit(WindowKind::Hour));
        let day_policy =
            RateLimitPolicy::for_window(WindowKind::Day, profile.effective_limit(WindowKind::Day));

        if profile.bypass || self.resolver.is_bypassed(tenant_id).await {
            let now_ms = self.clock.now_ms();
            return Ok(ProgressiveDecision {
                allowed: true,
                warning_level: 0,
                minute: AdmissionDecision::bypassed(&minute_policy, now_ms),
                hour: AdmissionDecision::bypassed(&hour_policy, now_ms),
                day: AdmissionDecision::bypassed(&day_policy, now_ms),
            });
        }

        let (minute, hour, day) = tokio::join!(
            self.check_window(scope, &minute_policy, Some(tenant_id), user_id),
            self.check_window(scope, &hour_policy, Some(tenant_id), user_id),
            self.check_window(scope, &day_policy, Some(tenant_id), user_id),
        );
        let minute = minute?;
        let hour = hour?;
        let day = day?;

        let warning_level = [
            (WindowKind::Minute, &minute),
            (WindowKind::Hour, &hour),
            (WindowKind::Day, &day),
        ]
        .iter()
        .map(|(kind, d)| services::warning_level(*kind, services::usage_ratio(d.current, d.limit)))
        .max()
        .unwrap_or(0);

        Ok(ProgressiveDecision {
            allowed: minute.allowed && hour.allowed && day.allowed,
            warning_level,
            minute,
            hour,
            day,
        })
    }

    /// Admit a connection against the tenant's concurrency budget.
    ///
    /// The connection id is added to the tenant- and user-scoped sets with a
    /// short TTL (refreshed on every check); on rejection the just-added
    /// member is removed so it does not count toward future checks.
    pub async fn check_concurrent_connections(
        &self,
        tenant_id: &TenantId,
        user_id: Option<&UserId>,
        connection_id: &ConnectionId,
    ) -> QuotaResult<ConnectionDecision> {
        let profile = self.resolver.profile(tenant_id).await;
        let limit = profile.effective_max_concurrent();

        if profile.bypass || self.resolver.is_bypassed(tenant_id).await {
            return Ok(ConnectionDecision {
                allowed: true,
                limit,
                active: 0,
                retry_after_secs: None,
            });
        }

        let now_ms = self.clock.now_ms();
        let ttl_ms = self.config.connection_ttl_ms();
        let member = connection_id.as_str();
        let tenant_key = self.config.tenant_connections_key(tenant_id);

        let active = self
            .store
            .add_connection(&tenant_key, member, now_ms + ttl_ms, now_ms, ttl_ms * 2)
            .await?;
        if let Some(user) = user_id {
            let user_key = self.config.user_connections_key(tenant_id, user);
            self.store
                .add_connection(&user_key, member, now_ms + ttl_ms, now_ms, ttl_ms * 2)
                .await?;
        }

        let allowed = active <= limit as u64;
        if !allowed {
            if let Err(e) = self.store.remove_connection(&tenant_key, member).await {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Failed to remove rejected connection; member expires via TTL"
                );
            }
            if let Some(user) = user_id {
                let user_key = self.config.user_connections_key(tenant_id, user);
                if let Err(e) = self.store.remove_connection(&user_key, member).await {
                    tracing::debug!(error = %e, "Failed to remove rejected user connection");
                }
            }
            let record = ViolationRecord::new(
                now_ms,
                ScopeKey::for_route(tenant_id, "connections"),
                Some(tenant_id.clone()),
                user_id.cloned(),
                active,
                limit,
            );
            self.emit_violation(record).await;
        }

        Ok(ConnectionDecision {
            allowed,
            limit,
            active: if allowed { active } else { active.saturating_sub(1) },
            retry_after_secs: (!allowed).then(|| ((ttl_ms / 1000) as u64).max(1)),
        })
    }

    /// Explicit removal on graceful disconnect
    pub async fn remove_connection(
        &self,
        tenant_id: &TenantId,
        user_id: Option<&UserId>,
        connection_id: &ConnectionId,
    ) -> QuotaResult<()> {
        let member = connection_id.as_str();
        self.store
            .remove_connection(&self.config.tenant_connections_key(tenant_id), member)
            .await?;
        if let Some(user) = user_id {
            self.store
                .remove_connection(&self.config.user_connections_key(tenant_id, user), member)
                .await?;
        }
        Ok(())
    }

    /// Flip the tenant bypass flag
    pub async fn set_bypass(&self, tenant_id: &TenantId, enabled: bool) -> QuotaResult<()> {
        self.resolver.set_bypass(tenant_id, enabled).await
    }

    pub async fn is_bypassed(&self, tenant_id: &TenantId) -> bool {
        self.resolver.is_bypassed(tenant_id).await
    }

    /// Drop the cached profile for a tenant (tier change hook)
    pub fn invalidate_tenant(&self, tenant_id: &TenantId) {
        self.resolver.invalidate(tenant_id);
    }

    async fn check_window(
        &self,
        scope: &ScopeKey,
        policy: &RateLimitPolicy,
        tenant_id: Option<&TenantId>,
        user_id: Option<&UserId>,
    ) -> QuotaResult<AdmissionDecision> {
        let now_ms = self.clock.now_ms();
        let window_start_ms = services::window_start_ms(now_ms, policy.window_ms());
        let key = self.config.counter_key(scope, policy.window_ms(), window_start_ms);
        let expire_ms = policy.window_ms() + self.config.counter_expiry_slack_ms();

        let current = self.store.increment_window(&key, expire_ms).await?;

        let limit = policy.max_requests();
        let allowed = current <= limit as u64;
        let reset_at_ms = window_start_ms + policy.window_ms();

        let decision = AdmissionDecision {
            allowed,
            limit,
            current,
            remaining: (limit as u64).saturating_sub(current) as u32,
            reset_at_ms,
            retry_after_secs: (!allowed).then(|| services::retry_after_secs(now_ms, reset_at_ms)),
        };

        if !allowed {
            tracing::debug!(
                scope = %scope,
                current,
                limit,
                "Admission rejected"
            );
            let record = ViolationRecord::new(
                now_ms,
                scope.clone(),
                tenant_id.cloned(),
                user_id.cloned(),
                current,
                limit,
            );
            self.emit_violation(record).await;
        }

        Ok(decision)
    }

    /// Violation handling is best-effort and never affects the decision:
    /// the monitor/sink path is infallible, the store retention write is
    /// fire-and-forget.
    async fn emit_violation(&self, record: ViolationRecord) {
        if let Some(alert) = self.monitor.record(&record, record.at_ms) {
            self.alert_sink.emit_alert(alert).await;
        }

        if let Some(tenant) = record.tenant_id.clone() {
            let key = self.config.violations_key(&tenant);
            let keep = self.config.violation_keep;
            let ttl_ms = self.config.violation_retention_ms();
            match serde_json::to_string(&record) {
                Ok(payload) => {
                    let store = Arc::clone(&self.store);
                    tokio::spawn(async move {
                        if let Err(e) = store.record_violation(&key, &payload, keep, ttl_ms).await {
                            tracing::debug!(error = %e, "Violation retention write failed");
                        }
                    });
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Violation serialization failed");
                }
            }
        }
    }
}
