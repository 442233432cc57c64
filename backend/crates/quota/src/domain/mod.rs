//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (TenantLimitProfile, ViolationRecord, Alert)
//! - Domain value objects (ScopeKey, RateLimitPolicy, Tier, WindowKind)
//! - Domain services (window math, warning levels, limit resolution)
//! - Store traits (interfaces)

pub mod entities;
pub mod services;
pub mod repository;
pub mod value_objects;
