//! Invalidation Use Cases
//!
//! Tag-based and pattern-based bulk invalidation, and the write-side
//! `handle_data_change` hook. Invalidation is eventually consistent with
//! concurrent stores (last writer wins) and degrades on store outages:
//! skipped with a logged warning, never surfaced.

use crate::application::config::CacheConfig;
use crate::domain::repository::CacheStore;
use futures_util::future::join_all;
use std::sync::Arc;

/// Invalidation Use Case
pub struct InvalidationUseCase<S>
where
    S: CacheStore,
{
    store: Arc<S>,
    config: Arc<CacheConfig>,
}

impl<S> InvalidationUseCase<S>
where
    S: CacheStore + Send + Sync,
{
    pub fn new(store: Arc<S>, config: Arc<CacheConfig>) -> Self {
        Self { store, config }
    }

    /// Delete every entry indexed under a tag, then the tag itself.
    /// Returns the number of entries deleted. A store added concurrently to
    /// the same tag may survive this pass; the next invalidation gets it.
    pub async fn invalidate_by_tag(&self, tag: &str) -> u64 {
        let tag_key = self.config.tag_key(tag);
        let members = match self.store.tag_members(&tag_key).await {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(tag, error = %e, "Tag invalidation skipped, store unavailable");
                return 0;
            }
        };

        let results = join_all(
            members
                .iter()
                .map(|entry_key| self.store.delete_entry(entry_key)),
        )
        .await;
        let deleted = results.iter().filter(|r| r.is_ok()).count() as u64;
        for (entry_key, result) in members.iter().zip(&results) {
            if let Err(e) = result {
                tracing::warn!(entry_key = %entry_key, error = %e, "Entry deletion failed");
            }
        }

        if let Err(e) = self.store.delete_tag(&tag_key).await {
            tracing::warn!(tag, error = %e, "Tag index deletion failed");
        }

        tracing::debug!(tag, deleted, "Tag invalidated");
        deleted
    }

    /// Coarse bulk delete over the entry keyspace, e.g. `clients:*`.
    /// Used when no tag applies. Returns the number of keys deleted.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> u64 {
        let full_pattern = self.config.entry_pattern(pattern);
        match self.store.delete_pattern(&full_pattern).await {
            Ok(deleted) => {
                tracing::debug!(pattern = %full_pattern, deleted, "Pattern invalidated");
                deleted
            }
            Err(e) => {
                tracing::warn!(
                    pattern = %full_pattern,
                    error = %e,
                    "Pattern invalidation skipped, store unavailable"
                );
                0
            }
        }
    }

    /// Write-side invalidation hook: a business entity changed, drop every
    /// response that could have rendered it. Tags from the static
    /// entity-type table plus an entity-id-scoped key pattern, invalidated
    /// concurrently.
    pub async fn handle_data_change(&self, entity_type: &str, entity_id: &str) {
        let tags = self
            .config
            .entity_tags
            .get(entity_type)
            .cloned()
            .unwrap_or_default();
        if tags.is_empty() {
            tracing::debug!(entity_type, "No cache tags mapped for entity type");
        }

        let pattern = format!("*:{}:*", entity_id);
        let (tag_counts, pattern_count) = tokio::join!(
            join_all(tags.iter().map(|tag| self.invalidate_by_tag(tag))),
            self.invalidate_by_pattern(&pattern),
        );

        tracing::info!(
            entity_type,
            entity_id,
            by_tag = tag_counts.iter().sum::<u64>(),
            by_pattern = pattern_count,
            "Data-change invalidation completed"
        );
    }
}
