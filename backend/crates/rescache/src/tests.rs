//! Unit tests for the rescache crate
//!
//! Exercised against the in-memory store with a manual clock, so entries
//! can be aged across freshness boundaries deterministically.

use crate::application::config::CacheConfig;
use crate::application::invalidate::InvalidationUseCase;
use crate::application::lookup::{LookupOutcome, LookupUseCase};
use crate::application::revalidate::RevalidationScheduler;
use crate::application::store_response::{StoreRequest, StoreResponseUseCase};
use crate::domain::repository::{CacheStore, ProduceRequest, ProducedResponse, ResponseProducer};
use crate::domain::services;
use crate::domain::value_objects::CacheOutcome;
use crate::error::{CacheError, CacheResult};
use crate::infra::memory::MemoryCacheStore;
use parking_lot::Mutex;
use platform::clock::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

#[derive(Default)]
struct StubProducer {
    body: Mutex<Vec<u8>>,
    calls: AtomicU32,
    fail: AtomicBool,
    hang: AtomicBool,
}

impl StubProducer {
    fn with_body(body: &[u8]) -> Self {
        Self {
            body: Mutex::new(body.to_vec()),
            ..Default::default()
        }
    }
}

impl ResponseProducer for StubProducer {
    async fn produce(&self, _request: &ProduceRequest) -> CacheResult<ProducedResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CacheError::Recomputation("stub producer failure".to_string()));
        }
        Ok(ProducedResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: self.body.lock().clone(),
        })
    }
}

struct Harness {
    store: Arc<MemoryCacheStore>,
    config: Arc<CacheConfig>,
    clock: Clock,
    lookup: LookupUseCase<MemoryCacheStore>,
    store_uc: StoreResponseUseCase<MemoryCacheStore>,
    invalidate: InvalidationUseCase<MemoryCacheStore>,
    producer: Arc<StubProducer>,
    scheduler: RevalidationScheduler<MemoryCacheStore, StubProducer>,
}

fn harness_with(config: CacheConfig) -> Harness {
    let clock = Clock::manual(1_000_000);
    let config = Arc::new(config);
    let store = Arc::new(MemoryCacheStore::new(clock.clone()));
    let producer = Arc::new(StubProducer::with_body(b"{\"v\":1}"));
    Harness {
        lookup: LookupUseCase::new(Arc::clone(&store), Arc::clone(&config), clock.clone()),
        store_uc: StoreResponseUseCase::new(Arc::clone(&store), Arc::clone(&config), clock.clone()),
        invalidate: InvalidationUseCase::new(Arc::clone(&store), Arc::clone(&config)),
        scheduler: RevalidationScheduler::new(
            Arc::clone(&store),
            Arc::clone(&producer),
            Arc::clone(&config),
            clock.clone(),
        ),
        store,
        config,
        clock,
        producer,
    }
}

fn harness() -> Harness {
    harness_with(CacheConfig {
        stale_window: Duration::from_secs(2),
        ..CacheConfig::default()
    })
}

fn request(route: &str, tags: &[&str]) -> StoreRequest {
    StoreRequest {
        route: route.to_string(),
        query: vec![],
        vary: vec![],
        status: 200,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: b"{\"v\":1}".to_vec(),
        ttl: Some(Duration::from_secs(5)),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

async fn drain_background() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

mod freshness_tests {
    use super::*;

    #[tokio::test]
    async fn store_then_lookup_is_fresh() {
        let h = harness();
        let entry = h.store_uc.execute(request("/clients", &["clients"])).await.unwrap();

        match h.lookup.classified(&entry.fingerprint).await {
            LookupOutcome::Fresh(found) => {
                assert_eq!(found.body, entry.body);
                assert_eq!(found.status, 200);
                assert_eq!(found.etag, entry.etag);
            }
            other => panic!("expected fresh, got {:?}", other.outcome()),
        }
    }

    #[tokio::test]
    async fn entry_walks_fresh_stale_expired() {
        let h = harness();
        let entry = h.store_uc.execute(request("/clients", &[])).await.unwrap();

        // ttl = 5s, stale window = 2s
        h.clock.advance_ms(4_999);
        assert_eq!(
            h.lookup.classified(&entry.fingerprint).await.outcome(),
            CacheOutcome::Hit
        );

        h.clock.advance_ms(1);
        assert_eq!(
            h.lookup.classified(&entry.fingerprint).await.outcome(),
            CacheOutcome::Stale
        );

        h.clock.advance_ms(1_999);
        assert_eq!(
            h.lookup.classified(&entry.fingerprint).await.outcome(),
            CacheOutcome::Stale
        );

        h.clock.advance_ms(1);
        assert_eq!(
            h.lookup.classified(&entry.fingerprint).await.outcome(),
            CacheOutcome::Miss
        );
    }

    #[tokio::test]
    async fn store_outage_reads_as_miss() {
        let h = harness();
        let entry = h.store_uc.execute(request("/clients", &[])).await.unwrap();

        h.store.set_unavailable(true);
        assert_eq!(
            h.lookup.classified(&entry.fingerprint).await.outcome(),
            CacheOutcome::Miss
        );
    }

    #[tokio::test]
    async fn corrupt_entry_self_heals() {
        let h = harness();
        let fp = services::compute_fingerprint("/clients", &[], &[]);
        let key = h.config.entry_key(&fp);
        h.store.put_entry(&key, "not valid json{", 60_000).await.unwrap();

        assert!(h.lookup.lookup(&fp).await.is_none());
        // The corrupt payload was deleted, not left to fail again
        assert_eq!(h.store.get_entry(&key).await.unwrap(), None);
    }
}

mod invalidation_tests {
    use super::*;

    #[tokio::test]
    async fn invalidate_by_tag_leaves_other_tags_untouched() {
        let h = harness();
        let clients = h
            .store_uc
            .execute(request("/clients", &["clients", "dashboard"]))
            .await
            .unwrap();
        let workflows = h
            .store_uc
            .execute(request("/workflows", &["workflows"]))
            .await
            .unwrap();

        let deleted = h.invalidate.invalidate_by_tag("clients").await;
        assert_eq!(deleted, 1);

        assert_eq!(
            h.lookup.classified(&clients.fingerprint).await.outcome(),
            CacheOutcome::Miss
        );
        assert_eq!(
            h.lookup.classified(&workflows.fingerprint).await.outcome(),
            CacheOutcome::Hit
        );

        // The tag's index entry is gone too
        let members = h.store.tag_members(&h.config.tag_key("clients")).await.unwrap();
        assert!(members.is_empty());
    }

    #[tokio::test]
    async fn invalidate_by_pattern_scopes_to_entity_id() {
        let h = harness();
        let detail = h.store_uc.execute(request("/clients/c1", &[])).await.unwrap();
        let other = h.store_uc.execute(request("/clients/c2", &[])).await.unwrap();

        let deleted = h.invalidate.invalidate_by_pattern("*:c1:*").await;
        assert_eq!(deleted, 1);
        assert_eq!(
            h.lookup.classified(&detail.fingerprint).await.outcome(),
            CacheOutcome::Miss
        );
        assert_eq!(
            h.lookup.classified(&other.fingerprint).await.outcome(),
            CacheOutcome::Hit
        );
    }

    #[tokio::test]
    async fn data_change_invalidates_tags_and_entity_pattern() {
        let h = harness();
        // Tagged listing, ttl=300 per the dashboard scenario
        let listing = h
            .store_uc
            .execute(StoreRequest {
                ttl: Some(Duration::from_secs(300)),
                ..request("/clients", &["clients", "dashboard"])
            })
            .await
            .unwrap();
        // Untagged detail page, caught by the entity-id pattern
        let detail = h.store_uc.execute(request("/clients/c1", &["misc"])).await.unwrap();
        // Unrelated entry survives
        let workflows = h
            .store_uc
            .execute(request("/workflows", &["workflows"]))
            .await
            .unwrap();

        h.invalidate.handle_data_change("client", "c1").await;

        assert_eq!(
            h.lookup.classified(&listing.fingerprint).await.outcome(),
            CacheOutcome::Miss
        );
        assert_eq!(
            h.lookup.classified(&detail.fingerprint).await.outcome(),
            CacheOutcome::Miss
        );
        assert_eq!(
            h.lookup.classified(&workflows.fingerprint).await.outcome(),
            CacheOutcome::Hit
        );
    }

    #[tokio::test]
    async fn unknown_entity_type_only_applies_pattern() {
        let h = harness();
        let detail = h.store_uc.execute(request("/invoices/i9", &[])).await.unwrap();

        h.invalidate.handle_data_change("invoice", "i9").await;
        assert_eq!(
            h.lookup.classified(&detail.fingerprint).await.outcome(),
            CacheOutcome::Miss
        );
    }

    #[tokio::test]
    async fn invalidation_skips_on_outage() {
        let h = harness();
        let entry = h.store_uc.execute(request("/clients", &["clients"])).await.unwrap();

        h.store.set_unavailable(true);
        assert_eq!(h.invalidate.invalidate_by_tag("clients").await, 0);
        assert_eq!(h.invalidate.invalidate_by_pattern("*").await, 0);

        h.store.set_unavailable(false);
        assert_eq!(
            h.lookup.classified(&entry.fingerprint).await.outcome(),
            CacheOutcome::Hit
        );
    }
}

mod conditional_tests {
    use super::*;

    #[tokio::test]
    async fn matching_etag_is_not_modified() {
        let h = harness();
        let entry = h.store_uc.execute(request("/clients", &[])).await.unwrap();

        let validators = h
            .lookup
            .conditional_check(&entry.fingerprint, Some(&entry.etag), None)
            .await
            .expect("matching etag should validate");
        assert_eq!(validators.etag, entry.etag);

        assert!(
            h.lookup
                .conditional_check(&entry.fingerprint, Some("\"other\""), None)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn if_modified_since_compares_to_last_modified() {
        let h = harness();
        let entry = h.store_uc.execute(request("/clients", &[])).await.unwrap();

        assert!(
            h.lookup
                .conditional_check(&entry.fingerprint, None, Some(entry.last_modified_ms))
                .await
                .is_some()
        );
        assert!(
            h.lookup
                .conditional_check(&entry.fingerprint, None, Some(entry.last_modified_ms - 2_000))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn absent_entry_never_validates() {
        let h = harness();
        let fp = services::compute_fingerprint("/nothing", &[], &[]);
        assert!(h.lookup.conditional_check(&fp, Some("*"), None).await.is_none());
    }
}

mod revalidation_tests {
    use super::*;

    #[tokio::test]
    async fn stale_entry_is_refreshed_in_background() {
        let h = harness();
        let entry = h.store_uc.execute(request("/clients", &["clients"])).await.unwrap();

        h.clock.advance_ms(5_500);
        let stale = match h.lookup.classified(&entry.fingerprint).await {
            LookupOutcome::Stale(entry) => entry,
            other => panic!("expected stale, got {:?}", other.outcome()),
        };

        *h.producer.body.lock() = b"{\"v\":2}".to_vec();
        assert!(h.scheduler.schedule(&stale));
        drain_background().await;

        assert_eq!(h.scheduler.in_flight_count(), 0);
        match h.lookup.classified(&entry.fingerprint).await {
            LookupOutcome::Fresh(refreshed) => {
                assert_eq!(refreshed.body, b"{\"v\":2}");
                assert_eq!(refreshed.tags, vec!["clients".to_string()]);
                assert_eq!(refreshed.ttl_ms, stale.ttl_ms);
                assert!(refreshed.created_at_ms > stale.created_at_ms);
                assert_ne!(refreshed.etag, stale.etag);
            }
            other => panic!("expected fresh after revalidation, got {:?}", other.outcome()),
        }
        assert_eq!(h.producer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn at_most_one_revalidation_per_fingerprint() {
        let h = harness();
        let first = h.store_uc.execute(request("/clients", &[])).await.unwrap();
        let second = h.store_uc.execute(request("/workflows", &[])).await.unwrap();

        h.clock.advance_ms(5_500);
        assert!(h.scheduler.schedule(&first));
        // Same fingerprint: already in flight
        assert!(!h.scheduler.schedule(&first));
        // Distinct fingerprints are independent
        assert!(h.scheduler.schedule(&second));

        drain_background().await;
        assert_eq!(h.scheduler.in_flight_count(), 0);
        // Marker cleared: a later stale hit may schedule again
        h.clock.advance_ms(5_500);
        assert!(h.scheduler.schedule(&first));
        drain_background().await;
    }

    #[tokio::test]
    async fn failed_revalidation_retains_the_stale_entry() {
        let h = harness();
        let entry = h.store_uc.execute(request("/clients", &[])).await.unwrap();

        h.clock.advance_ms(5_500);
        h.producer.fail.store(true, Ordering::SeqCst);
        assert!(h.scheduler.schedule(&entry));
        drain_background().await;

        assert_eq!(h.scheduler.in_flight_count(), 0);
        // Still stale-servable, self-heals on a later attempt
        assert_eq!(
            h.lookup.classified(&entry.fingerprint).await.outcome(),
            CacheOutcome::Stale
        );

        h.producer.fail.store(false, Ordering::SeqCst);
        assert!(h.scheduler.schedule(&entry));
        drain_background().await;
        assert_eq!(
            h.lookup.classified(&entry.fingerprint).await.outcome(),
            CacheOutcome::Hit
        );
    }

    #[tokio::test]
    async fn hung_revalidation_is_bounded_by_timeout() {
        let h = harness_with(CacheConfig {
            stale_window: Duration::from_secs(2),
            revalidate_timeout: Duration::from_millis(50),
            ..CacheConfig::default()
        });
        let entry = h.store_uc.execute(request("/clients", &[])).await.unwrap();

        h.clock.advance_ms(5_500);
        h.producer.hang.store(true, Ordering::SeqCst);
        assert!(h.scheduler.schedule(&entry));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(h.scheduler.in_flight_count(), 0);
        assert_eq!(
            h.lookup.classified(&entry.fingerprint).await.outcome(),
            CacheOutcome::Stale
        );
    }
}
