//! Domain Entities
//!
//! Core entities for the response-cache domain.

use crate::domain::value_objects::{Fingerprint, Validators};
use serde::{Deserialize, Serialize};

/// One cached response, stored wholesale in the shared store.
///
/// Carries the request parts (route, query, vary) alongside the response so
/// a background revalidation can re-invoke the producing operation without
/// the original request being around.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub route: String,
    pub query: Vec<(String, String)>,
    /// Vary header name/value pairs captured at fingerprint time
    pub vary: Vec<(String, String)>,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(with = "platform::crypto::base64_bytes")]
    pub body: Vec<u8>,
    pub created_at_ms: i64,
    pub ttl_ms: i64,
    pub stale_window_ms: i64,
    /// Content-hash ETag, stored quoted
    pub etag: String,
    pub last_modified_ms: i64,
    pub tags: Vec<String>,
}

impl CacheEntry {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.created_at_ms).max(0)
    }

    pub fn age_secs(&self, now_ms: i64) -> u64 {
        (self.age_ms(now_ms) / 1000) as u64
    }

    /// Lifetime in the store: fresh period plus the stale-servable window
    pub fn total_lifetime_ms(&self) -> i64 {
        self.ttl_ms + self.stale_window_ms
    }

    pub fn validators(&self) -> Validators {
        Validators {
            etag: self.etag.clone(),
            last_modified_ms: self.last_modified_ms,
        }
    }
}
