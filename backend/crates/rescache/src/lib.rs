//! Response Cache Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, freshness rules, fingerprinting, store traits
//! - `application/` - Use cases (lookup, store, invalidate, revalidate)
//! - `infra/` - Shared-store implementations (Redis, in-memory)
//! - `presentation/` - Cache response headers
//!
//! ## Freshness Model
//! An entry is Fresh while `age < ttl`, Stale-servable while
//! `ttl <= age < ttl + staleWindow`, and a miss after that. Stale entries
//! are served immediately while a background refresh recomputes them, at
//! most one in flight per fingerprint. Cache failures never surface to end
//! users; the worst case is recomputation.

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::CacheConfig;
pub use application::invalidate::InvalidationUseCase;
pub use application::lookup::{LookupOutcome, LookupUseCase};
pub use application::revalidate::RevalidationScheduler;
pub use application::store_response::{StoreRequest, StoreResponseUseCase};
pub use domain::entities::CacheEntry;
pub use domain::repository::{ProduceRequest, ProducedResponse};
pub use domain::value_objects::{CacheOutcome, Fingerprint, Freshness};
pub use error::{CacheError, CacheResult};
pub use infra::memory::MemoryCacheStore;
pub use infra::redis::RedisCacheStore;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[cfg(test)]
mod tests;
