//! Application Configuration
//!
//! Configuration for the response-cache layer: lifetimes, key layout and
//! the entity-type -> tags table driving write-side invalidation.

use crate::domain::value_objects::Fingerprint;
use std::collections::HashMap;
use std::time::Duration;

/// Response-cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Prefix for every key this layer writes to the shared store
    pub key_prefix: String,
    /// Fresh lifetime applied when a store request carries no TTL
    pub default_ttl: Duration,
    /// Stale-servable window past the fresh lifetime
    pub stale_window: Duration,
    /// Window during which a stale entry may answer for a failing producer
    pub stale_if_error: Duration,
    /// Bounded execution time for one background revalidation
    pub revalidate_timeout: Duration,
    /// Extra tag-set lifetime past the entry lifetime; keeps the tag-TTL >=
    /// entry-TTL invariant under clock slop
    pub tag_ttl_slack: Duration,
    /// Entity type -> cache tags invalidated when that entity changes
    pub entity_tags: HashMap<String, Vec<String>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let mut entity_tags = HashMap::new();
        entity_tags.insert(
            "client".to_string(),
            vec!["clients".to_string(), "dashboard".to_string()],
        );
        entity_tags.insert(
            "document".to_string(),
            vec!["documents".to_string(), "dashboard".to_string()],
        );
        entity_tags.insert("workflow".to_string(), vec!["workflows".to_string()]);
        entity_tags.insert("user".to_string(), vec!["users".to_string()]);

        Self {
            key_prefix: "rc".to_string(),
            default_ttl: Duration::from_secs(300),
            stale_window: Duration::from_secs(60),
            stale_if_error: Duration::from_secs(300),
            revalidate_timeout: Duration::from_secs(30),
            tag_ttl_slack: Duration::from_secs(60),
            entity_tags,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl_ms(&self) -> i64 {
        self.default_ttl.as_millis() as i64
    }

    pub fn stale_window_ms(&self) -> i64 {
        self.stale_window.as_millis() as i64
    }

    pub fn stale_if_error_secs(&self) -> u64 {
        self.stale_if_error.as_secs()
    }

    pub fn stale_if_error_ms(&self) -> i64 {
        self.stale_if_error.as_millis() as i64
    }

    pub fn tag_ttl_slack_ms(&self) -> i64 {
        self.tag_ttl_slack.as_millis() as i64
    }

    // ========================================================================
    // Store key layout
    // ========================================================================

    pub fn entry_key(&self, fingerprint: &Fingerprint) -> String {
        format!("{}:e:{}", self.key_prefix, fingerprint)
    }

    pub fn tag_key(&self, tag: &str) -> String {
        format!("{}:t:{}", self.key_prefix, tag)
    }

    /// Expand a caller pattern over the entry keyspace
    pub fn entry_pattern(&self, pattern: &str) -> String {
        format!("{}:e:{}", self.key_prefix, pattern)
    }

    /// Pattern matching every entry whose route contains the entity id as a
    /// path segment
    pub fn entity_pattern(&self, entity_id: &str) -> String {
        self.entry_pattern(&format!("*:{}:*", entity_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let config = CacheConfig::default();
        let fp = crate::domain::services::compute_fingerprint("/clients/c1", &[], &[]);
        let key = config.entry_key(&fp);
        assert!(key.starts_with("rc:e:clients:c1:"));
        assert_eq!(config.tag_key("clients"), "rc:t:clients");
        assert_eq!(config.entity_pattern("c1"), "rc:e:*:c1:*");
    }

    #[test]
    fn test_default_entity_tags() {
        let config = CacheConfig::default();
        assert_eq!(
            config.entity_tags.get("client").unwrap(),
            &vec!["clients".to_string(), "dashboard".to_string()]
        );
        assert!(config.entity_tags.get("invoice").is_none());
    }
}
