//! Store Traits
//!
//! Interfaces for the shared cache store and the response-producing port.
//! Implementations live in the infrastructure layer (store) and with the
//! caller (producer).

use crate::domain::entities::CacheEntry;
use crate::domain::value_objects::Fingerprint;
use crate::error::CacheResult;

/// Shared key-value store backing entries and the tag index.
///
/// Entries are stored as opaque payloads so decode failures can be handled
/// (and self-healed) in one place, the lookup use case.
#[trait_variant::make(CacheStore: Send)]
pub trait LocalCacheStore {
    /// Read an entry payload; `None` when absent or TTL-expired
    async fn get_entry(&self, key: &str) -> CacheResult<Option<String>>;

    /// Write an entry payload with a TTL covering fresh + stale lifetime
    async fn put_entry(&self, key: &str, payload: &str, ttl_ms: i64) -> CacheResult<()>;

    async fn delete_entry(&self, key: &str) -> CacheResult<()>;

    /// Add an entry key to a tag's set and refresh the set's TTL.
    /// The tag TTL must be at least the entry TTL, so a tag can reference
    /// an expired entry (harmless) but never the other way around.
    async fn add_tag_member(&self, tag_key: &str, entry_key: &str, ttl_ms: i64) -> CacheResult<()>;

    /// All entry keys currently indexed under a tag
    async fn tag_members(&self, tag_key: &str) -> CacheResult<Vec<String>>;

    async fn delete_tag(&self, tag_key: &str) -> CacheResult<()>;

    /// Coarse bulk delete by key pattern (`*` wildcards).
    /// Returns the number of deleted keys.
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;
}

/// Everything needed to re-invoke the response-producing operation
#[derive(Debug, Clone)]
pub struct ProduceRequest {
    pub fingerprint: Fingerprint,
    pub route: String,
    pub query: Vec<(String, String)>,
    pub vary: Vec<(String, String)>,
}

impl ProduceRequest {
    pub fn from_entry(entry: &CacheEntry) -> Self {
        Self {
            fingerprint: entry.fingerprint.clone(),
            route: entry.route.clone(),
            query: entry.query.clone(),
            vary: entry.vary.clone(),
        }
    }
}

/// Response computed by the caller on a miss or during revalidation
#[derive(Debug, Clone)]
pub struct ProducedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Caller-supplied operation that computes the response for a request.
///
/// Invoked synchronously on a miss and asynchronously (with a bounded
/// timeout, single attempt) during background revalidation.
#[trait_variant::make(ResponseProducer: Send)]
pub trait LocalResponseProducer {
    async fn produce(&self, request: &ProduceRequest) -> CacheResult<ProducedResponse>;
}
