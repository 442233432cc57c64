//! Unit tests for the quota crate
//!
//! Exercised against the in-memory store with a manual clock, so window
//! boundaries and TTLs are crossed deterministically.

use crate::application::admission::AdmissionController;
use crate::application::config::QuotaConfig;
use crate::application::tier_resolver::TierPolicyResolver;
use crate::application::violations::ViolationMonitor;
use crate::domain::entities::{Alert, LimitOverrides, TenantLimitProfile, ViolationRecord};
use crate::domain::repository::{AlertSink, QuotaStore, TenantPolicySource};
use crate::domain::value_objects::{RateLimitPolicy, ScopeKey, Tier};
use crate::error::{QuotaError, QuotaResult};
use crate::infra::memory::MemoryQuotaStore;
use kernel::id::{ConnectionId, TenantId, UserId};
use parking_lot::Mutex;
use platform::clock::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

struct StubPolicySource {
    profiles: Mutex<HashMap<String, TenantLimitProfile>>,
    fail: AtomicBool,
}

impl StubPolicySource {
    fn new() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        }
    }

    fn insert(&self, profile: TenantLimitProfile) {
        self.profiles
            .lock()
            .insert(profile.tenant_id.as_str().to_string(), profile);
    }
}

impl TenantPolicySource for StubPolicySource {
    async fn get_tenant_policy(
        &self,
        tenant_id: &TenantId,
    ) -> QuotaResult<Option<TenantLimitProfile>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(QuotaError::StoreUnavailable("source down".to_string()));
        }
        Ok(self.profiles.lock().get(tenant_id.as_str()).cloned())
    }
}

#[derive(Default)]
struct CapturingSink {
    alerts: Mutex<Vec<Alert>>,
}

impl AlertSink for CapturingSink {
    async fn emit_alert(&self, alert: Alert) {
        self.alerts.lock().push(alert);
    }
}

type TestController = AdmissionController<MemoryQuotaStore, StubPolicySource, CapturingSink>;

struct Harness {
    controller: TestController,
    store: Arc<MemoryQuotaStore>,
    source: Arc<StubPolicySource>,
    sink: Arc<CapturingSink>,
    clock: Clock,
    config: Arc<QuotaConfig>,
}

fn harness() -> Harness {
    let clock = Clock::manual(1_000_000);
    let config = Arc::new(QuotaConfig::default());
    let store = Arc::new(MemoryQuotaStore::new(clock.clone()));
    let source = Arc::new(StubPolicySource::new());
    let sink = Arc::new(CapturingSink::default());
    let resolver = Arc::new(TierPolicyResolver::new(
        Arc::clone(&source),
        Arc::clone(&store),
        Arc::clone(&config),
        clock.clone(),
    ));
    let monitor = Arc::new(ViolationMonitor::from_config(&config));
    let controller = AdmissionController::new(
        Arc::clone(&store),
        resolver,
        monitor,
        Arc::clone(&sink),
        Arc::clone(&config),
        clock.clone(),
    );
    Harness {
        controller,
        store,
        source,
        sink,
        clock,
        config,
    }
}

fn tenant(name: &str) -> TenantId {
    TenantId::parse(name).unwrap()
}

fn free_profile(tenant_id: &TenantId) -> TenantLimitProfile {
    TenantLimitProfile {
        tenant_id: tenant_id.clone(),
        tier: Tier::Free,
        per_minute: 60,
        per_hour: 1_000,
        per_day: 10_000,
        max_concurrent: 10,
        overrides: None,
        bypass: false,
    }
}

mod admission_tests {
    use super::*;

    #[tokio::test]
    async fn first_n_allowed_then_rejected_with_retry_hint() {
        let h = harness();
        let scope = ScopeKey::new("acme:list").unwrap();
        let policy = RateLimitPolicy::new(60_000, 5).unwrap();

        for i in 1..=5u64 {
            let d = h
                .controller
                .check_admission(&scope, &policy, None, None)
                .await
                .unwrap();
            assert!(d.allowed, "request {} should be admitted", i);
            assert_eq!(d.current, i);
            assert_eq!(d.remaining, 5 - i as u32);
            assert!(d.retry_after_secs.is_none());
        }

        let rejected = h
            .controller
            .check_admission(&scope, &policy, None, None)
            .await
            .unwrap();
        assert!(!rejected.allowed);
        assert_eq!(rejected.current, 6);
        assert_eq!(rejected.remaining, 0);
        assert!(rejected.retry_after_secs.unwrap() > 0);
    }

    #[tokio::test]
    async fn counter_increments_exactly_once_per_check() {
        let h = harness();
        let scope = ScopeKey::new("acme:list").unwrap();
        let policy = RateLimitPolicy::new(60_000, 2).unwrap();

        // Rejected checks still count, so usage ratios stay consistent
        for expected in 1..=6u64 {
            let d = h
                .controller
                .check_admission(&scope, &policy, None, None)
                .await
                .unwrap();
            assert_eq!(d.current, expected);
        }
    }

    #[tokio::test]
    async fn counter_resets_at_window_boundary() {
        let h = harness();
        let scope = ScopeKey::new("acme:list").unwrap();
        let policy = RateLimitPolicy::new(60_000, 1).unwrap();

        let first = h
            .controller
            .check_admission(&scope, &policy, None, None)
            .await
            .unwrap();
        assert!(first.allowed);

        let second = h
            .controller
            .check_admission(&scope, &policy, None, None)
            .await
            .unwrap();
        assert!(!second.allowed);

        // Next fixed window starts a fresh counter
        h.clock.advance_ms(60_000);
        let third = h
            .controller
            .check_admission(&scope, &policy, None, None)
            .await
            .unwrap();
        assert!(third.allowed);
        assert_eq!(third.current, 1);
    }

    #[tokio::test]
    async fn store_outage_surfaces_distinctly() {
        let h = harness();
        let scope = ScopeKey::new("acme:list").unwrap();
        let policy = RateLimitPolicy::new(60_000, 5).unwrap();

        h.store.set_unavailable(true);
        let result = h
            .controller
            .check_admission(&scope, &policy, None, None)
            .await;
        assert!(matches!(result, Err(QuotaError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn tenant_overrides_replace_matching_policy_fields() {
        let h = harness();
        let acme = tenant("acme");
        let mut profile = free_profile(&acme);
        profile.overrides = Some(LimitOverrides {
            per_minute: Some(3),
            ..Default::default()
        });
        h.source.insert(profile);
        let scope = ScopeKey::new("acme:list").unwrap();

        // Minute window: override replaces the base budget
        let minute_policy = RateLimitPolicy::new(60_000, 100).unwrap();
        let d = h
            .controller
            .check_admission(&scope, &minute_policy, Some(&acme), None)
            .await
            .unwrap();
        assert_eq!(d.limit, 3);

        // Hour window has no override: base budget kept
        let hour_policy = RateLimitPolicy::new(3_600_000, 100).unwrap();
        let d = h
            .controller
            .check_admission(&scope, &hour_policy, Some(&acme), None)
            .await
            .unwrap();
        assert_eq!(d.limit, 100);
    }

    #[tokio::test]
    async fn free_tier_scenario_sixty_per_minute() {
        let h = harness();
        let acme = tenant("acme");
        h.source.insert(free_profile(&acme));
        let scope = ScopeKey::new("acme:list").unwrap();

        for i in 1..=60u32 {
            let d = h
                .controller
                .check_progressive(&scope, &acme, None)
                .await
                .unwrap();
            assert!(d.allowed, "request {} should be admitted", i);
            assert_eq!(d.minute.remaining, 60 - i, "remaining should descend");
        }

        let rejected = h
            .controller
            .check_progressive(&scope, &acme, None)
            .await
            .unwrap();
        assert!(!rejected.allowed);
        assert_eq!(rejected.minute.remaining, 0);
        assert!(rejected.retry_after_secs().unwrap() > 0);
    }
}

mod progressive_tests {
    use super::*;

    #[tokio::test]
    async fn warning_level_is_monotone_as_usage_grows() {
        let h = harness();
        let acme = tenant("acme");
        let mut profile = free_profile(&acme);
        profile.per_minute = 10;
        h.source.insert(profile);
        let scope = ScopeKey::new("acme:list").unwrap();

        let mut previous = 0;
        let mut seen = Vec::new();
        for _ in 0..10 {
            let d = h
                .controller
                .check_progressive(&scope, &acme, None)
                .await
                .unwrap();
            assert!(
                d.warning_level >= previous,
                "warning level dropped: {:?}",
                seen
            );
            previous = d.warning_level;
            seen.push(d.warning_level);
        }
        // 40% / 60% / 80% crossings for the minute window
        assert_eq!(seen[3], 1);
        assert_eq!(seen[5], 2);
        assert_eq!(seen[7], 3);
    }

    #[tokio::test]
    async fn allowed_is_and_of_all_windows() {
        let h = harness();
        let acme = tenant("acme");
        let mut profile = free_profile(&acme);
        profile.per_minute = 100;
        profile.per_hour = 2;
        h.source.insert(profile);
        let scope = ScopeKey::new("acme:list").unwrap();

        for _ in 0..2 {
            let d = h
                .controller
                .check_progressive(&scope, &acme, None)
                .await
                .unwrap();
            assert!(d.allowed);
        }

        let d = h
            .controller
            .check_progressive(&scope, &acme, None)
            .await
            .unwrap();
        assert!(!d.allowed, "hour window should bind");
        // Representative numbers stay minute-window even when the hour
        // window caused the rejection
        assert!(d.minute.allowed);
        assert!(!d.hour.allowed);
        assert!(d.representative().allowed);
        assert!(d.retry_after_secs().unwrap() > 0);
    }

    #[tokio::test]
    async fn overrides_apply_to_progressive_limits() {
        let h = harness();
        let acme = tenant("acme");
        let mut profile = free_profile(&acme);
        profile.overrides = Some(LimitOverrides {
            per_minute: Some(120),
            ..Default::default()
        });
        h.source.insert(profile);
        let scope = ScopeKey::new("acme:list").unwrap();

        let d = h
            .controller
            .check_progressive(&scope, &acme, None)
            .await
            .unwrap();
        assert_eq!(d.minute.limit, 120);
        assert_eq!(d.hour.limit, 1_000);
    }

    #[tokio::test]
    async fn unknown_tenant_gets_free_defaults() {
        let h = harness();
        let ghost = tenant("ghost");
        let scope = ScopeKey::new("ghost:list").unwrap();

        let d = h
            .controller
            .check_progressive(&scope, &ghost, None)
            .await
            .unwrap();
        assert_eq!(d.minute.limit, h.config.free.per_minute);
    }

    #[tokio::test]
    async fn policy_source_outage_degrades_to_free_defaults() {
        let h = harness();
        let acme = tenant("acme");
        let mut profile = free_profile(&acme);
        profile.per_minute = 600;
        h.source.insert(profile);
        h.source.fail.store(true, Ordering::SeqCst);
        let scope = ScopeKey::new("acme:list").unwrap();

        let d = h
            .controller
            .check_progressive(&scope, &acme, None)
            .await
            .unwrap();
        assert_eq!(d.minute.limit, h.config.free.per_minute);
    }

    #[tokio::test]
    async fn tier_change_invalidation_refreshes_profile() {
        let h = harness();
        let acme = tenant("acme");
        h.source.insert(free_profile(&acme));
        let scope = ScopeKey::new("acme:list").unwrap();

        let before = h
            .controller
            .check_progressive(&scope, &acme, None)
            .await
            .unwrap();
        assert_eq!(before.minute.limit, 60);

        let mut upgraded = free_profile(&acme);
        upgraded.tier = Tier::Pro;
        upgraded.per_minute = 600;
        h.source.insert(upgraded);

        // Still cached until the tier-change hook fires
        let cached = h
            .controller
            .check_progressive(&scope, &acme, None)
            .await
            .unwrap();
        assert_eq!(cached.minute.limit, 60);

        h.controller.invalidate_tenant(&acme);
        let after = h
            .controller
            .check_progressive(&scope, &acme, None)
            .await
            .unwrap();
        assert_eq!(after.minute.limit, 600);
    }
}

mod connection_tests {
    use super::*;

    fn conn(name: &str) -> ConnectionId {
        ConnectionId::parse(name).unwrap()
    }

    #[tokio::test]
    async fn connections_up_to_limit_succeed_then_reject() {
        let h = harness();
        let acme = tenant("acme");
        let mut profile = free_profile(&acme);
        profile.max_concurrent = 3;
        h.source.insert(profile);

        for i in 1..=3u64 {
            let d = h
                .controller
                .check_concurrent_connections(&acme, None, &conn(&format!("c{}", i)))
                .await
                .unwrap();
            assert!(d.allowed, "connection {} should be admitted", i);
            assert_eq!(d.active, i);
        }

        let rejected = h
            .controller
            .check_concurrent_connections(&acme, None, &conn("c4"))
            .await
            .unwrap();
        assert!(!rejected.allowed);
        assert_eq!(rejected.active, 3, "rejected member must not linger");
        assert!(rejected.retry_after_secs.unwrap() > 0);

        // Set size stays at the limit
        let key = h.config.tenant_connections_key(&acme);
        let count = h.store.connection_count(&key, h.clock.now_ms()).await.unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn heartbeat_refresh_does_not_grow_the_set() {
        let h = harness();
        let acme = tenant("acme");
        let mut profile = free_profile(&acme);
        profile.max_concurrent = 3;
        h.source.insert(profile);

        for _ in 0..5 {
            let d = h
                .controller
                .check_concurrent_connections(&acme, None, &conn("c1"))
                .await
                .unwrap();
            assert!(d.allowed);
            assert_eq!(d.active, 1);
        }
    }

    #[tokio::test]
    async fn idle_connections_expire_via_ttl() {
        let h = harness();
        let acme = tenant("acme");
        let mut profile = free_profile(&acme);
        profile.max_concurrent = 2;
        h.source.insert(profile);

        for name in ["c1", "c2"] {
            h.controller
                .check_concurrent_connections(&acme, None, &conn(name))
                .await
                .unwrap();
        }
        let rejected = h
            .controller
            .check_concurrent_connections(&acme, None, &conn("c3"))
            .await
            .unwrap();
        assert!(!rejected.allowed);

        // Past the heartbeat TTL the stale members are pruned
        h.clock.advance_ms(h.config.connection_ttl_ms() + 1);
        let admitted = h
            .controller
            .check_concurrent_connections(&acme, None, &conn("c3"))
            .await
            .unwrap();
        assert!(admitted.allowed);
        assert_eq!(admitted.active, 1);
    }

    #[tokio::test]
    async fn explicit_removal_frees_a_slot() {
        let h = harness();
        let acme = tenant("acme");
        let user = UserId::parse("u-1").unwrap();
        let mut profile = free_profile(&acme);
        profile.max_concurrent = 1;
        h.source.insert(profile);

        let first = h
            .controller
            .check_concurrent_connections(&acme, Some(&user), &conn("c1"))
            .await
            .unwrap();
        assert!(first.allowed);

        let blocked = h
            .controller
            .check_concurrent_connections(&acme, Some(&user), &conn("c2"))
            .await
            .unwrap();
        assert!(!blocked.allowed);

        h.controller
            .remove_connection(&acme, Some(&user), &conn("c1"))
            .await
            .unwrap();

        let after = h
            .controller
            .check_concurrent_connections(&acme, Some(&user), &conn("c2"))
            .await
            .unwrap();
        assert!(after.allowed);
    }
}

mod bypass_tests {
    use super::*;

    #[tokio::test]
    async fn bypassed_tenant_is_admitted_without_counting() {
        let h = harness();
        let acme = tenant("acme");
        h.source.insert(free_profile(&acme));
        let scope = ScopeKey::new("acme:list").unwrap();
        let policy = RateLimitPolicy::new(60_000, 1).unwrap();

        h.controller.set_bypass(&acme, true).await.unwrap();
        assert!(h.controller.is_bypassed(&acme).await);

        for _ in 0..5 {
            let d = h
                .controller
                .check_admission(&scope, &policy, Some(&acme), None)
                .await
                .unwrap();
            assert!(d.allowed);
            assert_eq!(d.current, 0, "bypass must not increment");
        }

        // Clearing the flag re-enables counting from zero
        h.controller.set_bypass(&acme, false).await.unwrap();
        let d = h
            .controller
            .check_admission(&scope, &policy, Some(&acme), None)
            .await
            .unwrap();
        assert!(d.allowed);
        assert_eq!(d.current, 1);
    }

    #[tokio::test]
    async fn bypass_applies_to_progressive_and_connections() {
        let h = harness();
        let acme = tenant("acme");
        let mut profile = free_profile(&acme);
        profile.per_minute = 1;
        profile.max_concurrent = 1;
        h.source.insert(profile);
        let scope = ScopeKey::new("acme:list").unwrap();

        h.controller.set_bypass(&acme, true).await.unwrap();

        for _ in 0..3 {
            let d = h
                .controller
                .check_progressive(&scope, &acme, None)
                .await
                .unwrap();
            assert!(d.allowed);
            assert_eq!(d.warning_level, 0);
        }

        for i in 0..3 {
            let d = h
                .controller
                .check_concurrent_connections(
                    &acme,
                    None,
                    &ConnectionId::parse(format!("c{}", i)).unwrap(),
                )
                .await
                .unwrap();
            assert!(d.allowed);
        }
    }
}

mod violation_tests {
    use super::*;

    #[test]
    fn monitor_fires_at_threshold_and_debounces() {
        let monitor = ViolationMonitor::new(10, 300_000, 100);
        let scope = ScopeKey::new("acme:list").unwrap();
        let acme = tenant("acme");
        let record =
            ViolationRecord::new(0, scope, Some(acme), None, 11, 10);

        let mut now_ms = 1_000;
        for i in 1..=9 {
            assert!(
                monitor.record(&record, now_ms).is_none(),
                "no alert before threshold (violation {})",
                i
            );
        }
        let alert = monitor.record(&record, now_ms).expect("alert at threshold");
        assert_eq!(alert.violation_count, 10);
        assert_eq!(alert.monitor_key, "acme");

        // Another burst within the interval stays silent
        for _ in 0..20 {
            assert!(monitor.record(&record, now_ms).is_none());
        }

        // Past the interval the accumulated count fires again
        now_ms += 300_001;
        assert!(monitor.record(&record, now_ms).is_some());
    }

    #[test]
    fn monitor_capacity_is_bounded() {
        let monitor = ViolationMonitor::new(10, 300_000, 3);
        for i in 0..10 {
            let scope = ScopeKey::new(format!("t{}:list", i)).unwrap();
            let record = ViolationRecord::new(0, scope, None, None, 2, 1);
            monitor.record(&record, 1_000);
        }
        assert!(monitor.tracked_scopes() <= 3);
    }

    #[tokio::test]
    async fn repeated_rejections_emit_an_alert() {
        let h = harness();
        let scope = ScopeKey::new("acme:list").unwrap();
        let acme = tenant("acme");
        h.source.insert(free_profile(&acme));
        let policy = RateLimitPolicy::new(60_000, 1).unwrap();

        // First check is admitted; the next ten are violations
        for _ in 0..11 {
            h.controller
                .check_admission(&scope, &policy, Some(&acme), None)
                .await
                .unwrap();
        }

        let alerts = h.sink.alerts.lock();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].violation_count, 10);
    }

    #[tokio::test]
    async fn violations_are_retained_in_the_store() {
        let h = harness();
        let scope = ScopeKey::new("acme:list").unwrap();
        let acme = tenant("acme");
        h.source.insert(free_profile(&acme));
        let policy = RateLimitPolicy::new(60_000, 1).unwrap();

        for _ in 0..3 {
            h.controller
                .check_admission(&scope, &policy, Some(&acme), None)
                .await
                .unwrap();
        }

        // Retention writes are fire-and-forget; let them drain
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        let retained = h.store.violations_for(&h.config.violations_key(&acme));
        assert_eq!(retained.len(), 2);
        let parsed: ViolationRecord = serde_json::from_str(&retained[0]).unwrap();
        assert_eq!(parsed.limit, 1);
        assert!(parsed.observed > 1);
    }
}
