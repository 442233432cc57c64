//! Common ID Types
//!
//! Type-safe ID wrappers for the external principals this core scopes its
//! decisions by. Tenants, users and connections are identified by opaque
//! string slugs issued elsewhere (the subscription service, the API gateway),
//! so the ids are string-backed rather than UUID-backed.

use std::fmt;
use std::marker::PhantomData;

/// Maximum accepted id length. Ids become parts of store keys, so they are
/// kept short and free of the key separator characters.
const MAX_ID_LEN: usize = 128;

/// Generic typed ID wrapper
///
/// Usage:
/// ```
/// use kernel::id::{Id, markers};
/// type TenantId = Id<markers::Tenant>;
/// let id = TenantId::parse("acme").unwrap();
/// assert_eq!(id.as_str(), "acme");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    /// Parse an id from an externally supplied string.
    ///
    /// Rejects empty ids, ids longer than 128 bytes, and ids containing
    /// whitespace, `:` or `*` (reserved by store key syntax).
    pub fn parse(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_ID_LEN {
            return None;
        }
        if value
            .chars()
            .any(|c| c.is_whitespace() || c == ':' || c == '*')
        {
            return None;
        }
        Some(Self {
            value,
            _marker: PhantomData,
        })
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Consume into the underlying string
    pub fn into_string(self) -> String {
        self.value
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> serde::Serialize for Id<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T> serde::Deserialize<'de> for Id<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = <String as serde::Deserialize>::deserialize(deserializer)?;
        Id::parse(value).ok_or_else(|| serde::de::Error::custom("invalid id"))
    }
}

/// Marker types for different principal IDs
pub mod markers {
    /// Marker for tenant (organization account) IDs
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Tenant;

    /// Marker for user IDs
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    pub struct User;

    /// Marker for connection IDs
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Connection;
}

/// Type aliases for common IDs
pub type TenantId = Id<markers::Tenant>;
pub type UserId = Id<markers::User>;
pub type ConnectionId = Id<markers::Connection>;
