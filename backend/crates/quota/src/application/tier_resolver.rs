//! Tier Policy Resolver
//!
//! Maps a tenant to its effective limits profile: tier defaults from the
//! external subscription service, per-tenant overrides, bypass flag.
//! Profiles are cached in-process with a TTL; the bypass flag is written
//! through to the shared store so every replica agrees on it.

use crate::application::config::QuotaConfig;
use crate::domain::entities::TenantLimitProfile;
use crate::domain::repository::{QuotaStore, TenantPolicySource};
use crate::domain::value_objects::Tier;
use crate::error::QuotaResult;
use kernel::id::TenantId;
use parking_lot::Mutex;
use platform::clock::Clock;
use std::collections::HashMap;
use std::sync::Arc;

struct CachedProfile {
    profile: TenantLimitProfile,
    cached_at_ms: i64,
}

/// Per-instance tenant policy resolver
pub struct TierPolicyResolver<P, S>
where
    P: TenantPolicySource,
    S: QuotaStore,
{
    source: Arc<P>,
    store: Arc<S>,
    config: Arc<QuotaConfig>,
    clock: Clock,
    cache: Mutex<HashMap<String, CachedProfile>>,
}

impl<P, S> TierPolicyResolver<P, S>
where
    P: TenantPolicySource,
    S: QuotaStore,
{
    pub fn new(source: Arc<P>, store: Arc<S>, config: Arc<QuotaConfig>, clock: Clock) -> Self {
        Self {
            source,
            store,
            config,
            clock,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the limits profile for a tenant.
    ///
    /// Source failures degrade to free-tier defaults with a logged warning;
    /// admission keeps working while the subscription service is down.
    /// Degraded profiles are not cached.
    pub async fn profile(&self, tenant_id: &TenantId) -> TenantLimitProfile {
        let now_ms = self.clock.now_ms();

        if let Some(cached) = self.cached_profile(tenant_id, now_ms) {
            return cached;
        }

        match self.source.get_tenant_policy(tenant_id).await {
            Ok(Some(profile)) => {
                self.insert_cached(tenant_id, profile.clone(), now_ms);
                profile
            }
            Ok(None) => {
                // Unknown tenant: free-tier defaults, cached like a hit so
                // the source is not hammered per request
                let profile = self.default_profile(tenant_id);
                self.insert_cached(tenant_id, profile.clone(), now_ms);
                profile
            }
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Tenant policy source unavailable, using free-tier defaults"
                );
                self.default_profile(tenant_id)
            }
        }
    }

    /// Drop the cached profile for a tenant (tier change hook)
    pub fn invalidate(&self, tenant_id: &TenantId) {
        self.cache.lock().remove(tenant_id.as_str());
        tracing::debug!(tenant_id = %tenant_id, "Tenant profile cache invalidated");
    }

    /// Flip the bypass flag for a tenant, shared-store backed
    pub async fn set_bypass(&self, tenant_id: &TenantId, enabled: bool) -> QuotaResult<()> {
        self.store
            .set_flag(&self.config.bypass_key(tenant_id), enabled, None)
            .await?;
        // Keep the cached profile coherent without refetching
        if let Some(cached) = self.cache.lock().get_mut(tenant_id.as_str()) {
            cached.profile.bypass = enabled;
        }
        tracing::info!(tenant_id = %tenant_id, enabled, "Tenant bypass flag updated");
        Ok(())
    }

    /// Whether a tenant bypasses admission entirely.
    ///
    /// An unreachable store reads as "not bypassed": bypass is a convenience
    /// and must not widen during an outage.
    pub async fn is_bypassed(&self, tenant_id: &TenantId) -> bool {
        let now_ms = self.clock.now_ms();
        if let Some(profile) = self.cached_profile(tenant_id, now_ms) {
            if profile.bypass {
                return true;
            }
        }
        match self.store.get_flag(&self.config.bypass_key(tenant_id)).await {
            Ok(flag) => flag,
            Err(e) => {
                tracing::debug!(tenant_id = %tenant_id, error = %e, "Bypass flag read failed");
                false
            }
        }
    }

    fn cached_profile(&self, tenant_id: &TenantId, now_ms: i64) -> Option<TenantLimitProfile> {
        let cache = self.cache.lock();
        let cached = cache.get(tenant_id.as_str())?;
        if now_ms - cached.cached_at_ms < self.config.profile_cache_ttl_ms() {
            Some(cached.profile.clone())
        } else {
            None
        }
    }

    fn insert_cached(&self, tenant_id: &TenantId, profile: TenantLimitProfile, now_ms: i64) {
        let mut cache = self.cache.lock();
        if cache.len() >= self.config.profile_cache_capacity {
            let ttl_ms = self.config.profile_cache_ttl_ms();
            cache.retain(|_, c| now_ms - c.cached_at_ms < ttl_ms);
        }
        if cache.len() < self.config.profile_cache_capacity {
            cache.insert(
                tenant_id.as_str().to_string(),
                CachedProfile {
                    profile,
                    cached_at_ms: now_ms,
                },
            );
        }
    }

    fn default_profile(&self, tenant_id: &TenantId) -> TenantLimitProfile {
        let limits = self.config.tier_limits(Tier::Free);
        TenantLimitProfile {
            tenant_id: tenant_id.clone(),
            tier: Tier::Free,
            per_minute: limits.per_minute,
            per_hour: limits.per_hour,
            per_day: limits.per_day,
            max_concurrent: limits.max_concurrent,
            overrides: None,
            bypass: false,
        }
    }
}
