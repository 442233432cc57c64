//! In-Memory Store Implementation
//!
//! Single-process stand-in for the shared store, used by tests and local
//! development. TTLs are evaluated lazily against an injected clock.

use crate::domain::repository::CacheStore;
use crate::error::{CacheError, CacheResult};
use parking_lot::Mutex;
use platform::clock::Clock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

struct StoredValue {
    payload: String,
    expires_at_ms: i64,
}

struct TagSet {
    members: HashSet<String>,
    expires_at_ms: i64,
}

/// In-memory cache store
pub struct MemoryCacheStore {
    clock: Clock,
    entries: Mutex<HashMap<String, StoredValue>>,
    tags: Mutex<HashMap<String, TagSet>>,
    unavailable: AtomicBool,
}

impl MemoryCacheStore {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
            tags: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate a store outage: every operation fails until cleared
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of live (non-expired) entries
    pub fn entry_count(&self) -> usize {
        let now_ms = self.clock.now_ms();
        self.entries
            .lock()
            .values()
            .filter(|v| v.expires_at_ms > now_ms)
            .count()
    }

    fn check_available(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::StoreUnavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

/// Glob match supporting `*` wildcards only, the subset SCAN MATCH uses here
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let mut remainder = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            let Some(rest) = remainder.strip_prefix(part) else {
                return false;
            };
            remainder = rest;
        } else if i == parts.len() - 1 {
            return remainder.ends_with(part);
        } else {
            let Some(at) = remainder.find(part) else {
                return false;
            };
            remainder = &remainder[at + part.len()..];
        }
    }
    // Pattern ended with '*'
    true
}

impl CacheStore for MemoryCacheStore {
    async fn get_entry(&self, key: &str) -> CacheResult<Option<String>> {
        self.check_available()?;
        let now_ms = self.clock.now_ms();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(value) if value.expires_at_ms > now_ms => Ok(Some(value.payload.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put_entry(&self, key: &str, payload: &str, ttl_ms: i64) -> CacheResult<()> {
        self.check_available()?;
        self.entries.lock().insert(
            key.to_string(),
            StoredValue {
                payload: payload.to_string(),
                expires_at_ms: self.clock.now_ms() + ttl_ms,
            },
        );
        Ok(())
    }

    async fn delete_entry(&self, key: &str) -> CacheResult<()> {
        self.check_available()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn add_tag_member(&self, tag_key: &str, entry_key: &str, ttl_ms: i64) -> CacheResult<()> {
        self.check_available()?;
        let now_ms = self.clock.now_ms();
        let mut tags = self.tags.lock();
        let set = tags.entry(tag_key.to_string()).or_insert_with(|| TagSet {
            members: HashSet::new(),
            expires_at_ms: 0,
        });
        if set.expires_at_ms != 0 && set.expires_at_ms <= now_ms {
            set.members.clear();
        }
        set.members.insert(entry_key.to_string());
        set.expires_at_ms = now_ms + ttl_ms;
        Ok(())
    }

    async fn tag_members(&self, tag_key: &str) -> CacheResult<Vec<String>> {
        self.check_available()?;
        let now_ms = self.clock.now_ms();
        let tags = self.tags.lock();
        match tags.get(tag_key) {
            Some(set) if set.expires_at_ms > now_ms => Ok(set.members.iter().cloned().collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn delete_tag(&self, tag_key: &str) -> CacheResult<()> {
        self.check_available()?;
        self.tags.lock().remove(tag_key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.check_available()?;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !glob_match(pattern, key));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("rc:e:*", "rc:e:clients:c1:abc"));
        assert!(glob_match("rc:e:*:c1:*", "rc:e:clients:c1:abc"));
        assert!(!glob_match("rc:e:*:c2:*", "rc:e:clients:c1:abc"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
        assert!(glob_match("*tail", "long-tail"));
        assert!(!glob_match("*tail", "tailless"));
    }
}
