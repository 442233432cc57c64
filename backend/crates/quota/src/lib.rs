//! Quota Backend Module - Admission Control
//!
//! Clean Architecture structure:
//! - `domain/` - Business logic, entities, store traits
//! - `application/` - Use cases (admission checks, tier resolution, violations)
//! - `infra/` - Shared-store implementations (Redis, in-memory)
//! - `presentation/` - Rate-limit headers and HTTP middleware
//!
//! ## Admission Model
//! - Fixed windows aligned to `floor(now / window) * window`; boundary bursts
//!   can approach twice the nominal rate, accepted for O(1) counters
//! - Every check increments its counter exactly once, allowed or not
//! - The shared store is the only cross-instance serialization point
//! - Violation handling is best-effort and never affects the decision

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::admission::{
    AdmissionController, AdmissionDecision, ConnectionDecision, ProgressiveDecision,
};
pub use application::config::{QuotaConfig, TierLimits};
pub use application::tier_resolver::TierPolicyResolver;
pub use application::violations::{TracingAlertSink, ViolationMonitor};
pub use error::{QuotaError, QuotaResult};
pub use infra::memory::MemoryQuotaStore;
pub use infra::redis::RedisQuotaStore;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[cfg(test)]
mod tests;
