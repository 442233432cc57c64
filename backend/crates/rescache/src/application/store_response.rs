//! Store Response Use Case
//!
//! Persists a computed response wholesale: entry payload with a TTL
//! covering fresh + stale lifetime, validators derived from the content,
//! and a tag-index update for every tag.

use crate::application::config::CacheConfig;
use crate::domain::entities::CacheEntry;
use crate::domain::repository::CacheStore;
use crate::domain::services;
use crate::error::CacheResult;
use platform::clock::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Input DTO for storing a computed response
#[derive(Debug, Clone)]
pub struct StoreRequest {
    pub route: String,
    pub query: Vec<(String, String)>,
    /// Vary header name/value pairs the response depends on
    pub vary: Vec<(String, String)>,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Fresh lifetime; config default when absent
    pub ttl: Option<Duration>,
    pub tags: Vec<String>,
}

/// Store Response Use Case
pub struct StoreResponseUseCase<S>
where
    S: CacheStore,
{
    store: Arc<S>,
    config: Arc<CacheConfig>,
    clock: Clock,
}

impl<S> StoreResponseUseCase<S>
where
    S: CacheStore + Send + Sync,
{
    pub fn new(store: Arc<S>, config: Arc<CacheConfig>, clock: Clock) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Build the entry (fingerprint, validators, timestamps) and persist it
    pub async fn execute(&self, request: StoreRequest) -> CacheResult<CacheEntry> {
        let fingerprint =
            services::compute_fingerprint(&request.route, &request.query, &request.vary);
        let now_ms = self.clock.now_ms();
        let ttl_ms = request
            .ttl
            .map(|ttl| ttl.as_millis() as i64)
            .unwrap_or_else(|| self.config.default_ttl_ms());

        let entry = CacheEntry {
            fingerprint,
            route: request.route,
            query: request.query,
            vary: request.vary,
            status: request.status,
            headers: request.headers,
            etag: services::etag_for(&request.body),
            body: request.body,
            created_at_ms: now_ms,
            ttl_ms,
            stale_window_ms: self.config.stale_window_ms(),
            last_modified_ms: now_ms,
            tags: request.tags,
        };

        persist_entry(&*self.store, &self.config, &entry).await?;

        tracing::debug!(
            fingerprint = %entry.fingerprint,
            ttl_ms = entry.ttl_ms,
            tags = entry.tags.len(),
            "Response cached"
        );
        Ok(entry)
    }
}

/// Write an entry and index it under its tags.
///
/// Shared by the store use case and background revalidation, which re-stores
/// with identical tags and lifetimes.
pub(crate) async fn persist_entry<S>(
    store: &S,
    config: &CacheConfig,
    entry: &CacheEntry,
) -> CacheResult<()>
where
    S: CacheStore + Sync,
{
    let payload = serde_json::to_string(entry)?;
    let entry_key = config.entry_key(&entry.fingerprint);
    // Retain past the stale window when stale-if-error is longer, so the
    // error-fallback path still finds a body to serve
    let retain_ms = entry.ttl_ms + entry.stale_window_ms.max(config.stale_if_error_ms());

    store.put_entry(&entry_key, &payload, retain_ms).await?;

    let tag_ttl_ms = retain_ms + config.tag_ttl_slack_ms();
    for tag in &entry.tags {
        store
            .add_tag_member(&config.tag_key(tag), &entry_key, tag_ttl_ms)
            .await?;
    }
    Ok(())
}
