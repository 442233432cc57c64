//! Revalidation Scheduler
//!
//! Background refresh of stale-but-servable entries. The triggering request
//! is never blocked: the stale entry is returned immediately and the
//! recomputation runs as a detached task with a bounded timeout and a
//! single attempt. A keyed in-flight marker guarantees at most one
//! concurrent revalidation per fingerprint per instance.

use crate::application::config::CacheConfig;
use crate::application::store_response::persist_entry;
use crate::domain::entities::CacheEntry;
use crate::domain::repository::{CacheStore, ProduceRequest, ResponseProducer};
use crate::domain::services;
use crate::error::{CacheError, CacheResult};
use parking_lot::Mutex;
use platform::clock::Clock;
use std::collections::HashSet;
use std::sync::Arc;

/// Revalidation Scheduler
pub struct RevalidationScheduler<S, R>
where
    S: CacheStore,
    R: ResponseProducer,
{
    store: Arc<S>,
    producer: Arc<R>,
    config: Arc<CacheConfig>,
    clock: Clock,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<S, R> RevalidationScheduler<S, R>
where
    S: CacheStore + Send + Sync + 'static,
    R: ResponseProducer + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, producer: Arc<R>, config: Arc<CacheConfig>, clock: Clock) -> Self {
        Self {
            store,
            producer,
            config,
            clock,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Number of revalidations currently in flight on this instance
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Schedule a background refresh for a stale entry.
    ///
    /// Returns `false` when a refresh for this fingerprint is already in
    /// flight. On failure or timeout the stale entry is left in place; it
    /// self-heals on a later access until the stale window runs out.
    pub fn schedule(&self, entry: &CacheEntry) -> bool {
        let key = entry.fingerprint.as_str().to_string();
        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.insert(key.clone()) {
                tracing::debug!(fingerprint = %key, "Revalidation already in flight");
                return false;
            }
        }

        let store = Arc::clone(&self.store);
        let producer = Arc::clone(&self.producer);
        let config = Arc::clone(&self.config);
        let clock = self.clock.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let entry = entry.clone();
        let timeout = self.config.revalidate_timeout;

        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                timeout,
                revalidate_entry(&*store, &*producer, &config, &clock, &entry),
            )
            .await;
            match outcome {
                Ok(Ok(())) => {
                    tracing::debug!(fingerprint = %key, "Entry revalidated");
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        fingerprint = %key,
                        error = %e,
                        "Revalidation failed, stale entry retained"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        fingerprint = %key,
                        timeout_ms = timeout.as_millis() as u64,
                        "Revalidation timed out, stale entry retained"
                    );
                }
            }
            in_flight.lock().remove(&key);
        });
        true
    }
}

/// Recompute one entry and re-store it with identical tags and lifetimes
async fn revalidate_entry<S, R>(
    store: &S,
    producer: &R,
    config: &CacheConfig,
    clock: &Clock,
    entry: &CacheEntry,
) -> CacheResult<()>
where
    S: CacheStore + Sync,
    R: ResponseProducer + Sync,
{
    let request = ProduceRequest::from_entry(entry);
    let produced = producer
        .produce(&request)
        .await
        .map_err(|e| CacheError::Recomputation(e.to_string()))?;

    let now_ms = clock.now_ms();
    let refreshed = CacheEntry {
        fingerprint: entry.fingerprint.clone(),
        route: entry.route.clone(),
        query: entry.query.clone(),
        vary: entry.vary.clone(),
        status: produced.status,
        headers: produced.headers,
        etag: services::etag_for(&produced.body),
        body: produced.body,
        created_at_ms: now_ms,
        ttl_ms: entry.ttl_ms,
        stale_window_ms: entry.stale_window_ms,
        last_modified_ms: now_ms,
        tags: entry.tags.clone(),
    };

    persist_entry(store, config, &refreshed).await
}
