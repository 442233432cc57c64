//! Lookup Use Case
//!
//! Cache reads degrade, never fail: a store outage reads as a miss, an
//! unparsable entry is deleted (self-heal) and reads as a miss. The worst
//! case for the caller is recomputation, not an error.

use crate::application::config::CacheConfig;
use crate::domain::entities::CacheEntry;
use crate::domain::repository::CacheStore;
use crate::domain::services;
use crate::domain::value_objects::{CacheOutcome, Fingerprint, Freshness, Validators};
use platform::clock::Clock;
use std::sync::Arc;

/// Result of a classified lookup
#[derive(Debug, Clone)]
pub enum LookupOutcome {
    Fresh(CacheEntry),
    /// Stale-servable: return it and schedule a background refresh
    Stale(CacheEntry),
    Miss,
}

impl LookupOutcome {
    pub fn outcome(&self) -> CacheOutcome {
        match self {
            LookupOutcome::Fresh(_) => CacheOutcome::Hit,
            LookupOutcome::Stale(_) => CacheOutcome::Stale,
            LookupOutcome::Miss => CacheOutcome::Miss,
        }
    }

    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            LookupOutcome::Fresh(entry) | LookupOutcome::Stale(entry) => Some(entry),
            LookupOutcome::Miss => None,
        }
    }
}

/// Lookup Use Case
pub struct LookupUseCase<S>
where
    S: CacheStore,
{
    store: Arc<S>,
    config: Arc<CacheConfig>,
    clock: Clock,
}

impl<S> LookupUseCase<S>
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

    /// Raw lookup: the entry if present and decodable, whatever its age
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let key = self.config.entry_key(fingerprint);
        let payload = match self.store.get_entry(&key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    error = %e,
                    "Cache read failed, treating as miss"
                );
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&payload) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    error = %e,
                    "Unparsable cache entry, deleting"
                );
                if let Err(e) = self.store.delete_entry(&key).await {
                    tracing::debug!(error = %e, "Failed to delete corrupt entry");
                }
                None
            }
        }
    }

    /// Freshness of an entry at the current instant
    pub fn classify(&self, entry: &CacheEntry) -> Freshness {
        services::classify(entry, self.clock.now_ms())
    }

    /// Lookup + classification; expired entries read as misses
    pub async fn classified(&self, fingerprint: &Fingerprint) -> LookupOutcome {
        let Some(entry) = self.lookup(fingerprint).await else {
            return LookupOutcome::Miss;
        };
        match self.classify(&entry) {
            Freshness::Fresh => LookupOutcome::Fresh(entry),
            Freshness::Stale => LookupOutcome::Stale(entry),
            Freshness::Expired => LookupOutcome::Miss,
        }
    }

    /// Conditional check: the stored validators when the client's cached
    /// copy is still good (ETag match, or Last-Modified not newer), `None`
    /// when the response must be recomputed or resent
    pub async fn conditional_check(
        &self,
        fingerprint: &Fingerprint,
        if_none_match: Option<&str>,
        if_modified_since_ms: Option<i64>,
    ) -> Option<Validators> {
        let Some(entry) = self.lookup(fingerprint).await else {
            return None;
        };
        if matches!(self.classify(&entry), Freshness::Expired) {
            return None;
        }
        if services::is_not_modified(&entry, if_none_match, if_modified_since_ms) {
            Some(entry.validators())
        } else {
            None
        }
    }
}
