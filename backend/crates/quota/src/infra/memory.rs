//! In-Memory Store Implementation
//!
//! Single-process stand-in for the shared store, used by tests and local
//! development. Expiry is evaluated lazily against an injected clock so
//! tests can cross window boundaries deterministically. An outage can be
//! simulated with [`MemoryQuotaStore::set_unavailable`].

use crate::domain::repository::QuotaStore;
use crate::error::{QuotaError, QuotaResult};
use parking_lot::Mutex;
use platform::clock::Clock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

struct Counter {
    count: u64,
    expires_at_ms: i64,
}

#[derive(Default)]
struct ConnectionSet {
    /// member -> member expiry
    members: HashMap<String, i64>,
    key_expires_at_ms: i64,
}

/// In-memory quota store
pub struct MemoryQuotaStore {
    clock: Clock,
    counters: Mutex<HashMap<String, Counter>>,
    connections: Mutex<HashMap<String, ConnectionSet>>,
    flags: Mutex<HashMap<String, (bool, Option<i64>)>>,
    violations: Mutex<HashMap<String, Vec<String>>>,
    unavailable: AtomicBool,
}

impl MemoryQuotaStore {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            counters: Mutex::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
            flags: Mutex::new(HashMap::new()),
            violations: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate a store outage: every operation fails until cleared
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Recorded violation payloads for a key (test inspection)
    pub fn violations_for(&self, key: &str) -> Vec<String> {
        self.violations.lock().get(key).cloned().unwrap_or_default()
    }

    fn check_available(&self) -> QuotaResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QuotaError::StoreUnavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl QuotaStore for MemoryQuotaStore {
    async fn increment_window(&self, key: &str, expire_ms: i64) -> QuotaResult<u64> {
        self.check_available()?;
        let now_ms = self.clock.now_ms();
        let mut counters = self.counters.lock();
        let counter = counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at_ms: 0,
        });
        if counter.expires_at_ms != 0 && counter.expires_at_ms <= now_ms {
            counter.count = 0;
        }
        counter.count += 1;
        counter.expires_at_ms = now_ms + expire_ms;
        Ok(counter.count)
    }

    async fn add_connection(
        &self,
        set_key: &str,
        member: &str,
        expires_at_ms: i64,
        now_ms: i64,
        key_ttl_ms: i64,
    ) -> QuotaResult<u64> {
        self.check_available()?;
        let mut connections = self.connections.lock();
        let set = connections.entry(set_key.to_string()).or_default();
        if set.key_expires_at_ms != 0 && set.key_expires_at_ms <= now_ms {
            set.members.clear();
        }
        set.members.retain(|_, expiry| *expiry > now_ms);
        set.members.insert(member.to_string(), expires_at_ms);
        set.key_expires_at_ms = now_ms + key_ttl_ms;
        Ok(set.members.len() as u64)
    }

    async fn remove_connection(&self, set_key: &str, member: &str) -> QuotaResult<()> {
        self.check_available()?;
        if let Some(set) = self.connections.lock().get_mut(set_key) {
            set.members.remove(member);
        }
        Ok(())
    }

    async fn connection_count(&self, set_key: &str, now_ms: i64) -> QuotaResult<u64> {
        self.check_available()?;
        let mut connections = self.connections.lock();
        let Some(set) = connections.get_mut(set_key) else {
            return Ok(0);
        };
        if set.key_expires_at_ms != 0 && set.key_expires_at_ms <= now_ms {
            set.members.clear();
        }
        set.members.retain(|_, expiry| *expiry > now_ms);
        Ok(set.members.len() as u64)
    }

    async fn set_flag(&self, key: &str, value: bool, ttl_ms: Option<i64>) -> QuotaResult<()> {
        self.check_available()?;
        let mut flags = self.flags.lock();
        if value {
            let expires_at_ms = ttl_ms.map(|ttl| self.clock.now_ms() + ttl);
            flags.insert(key.to_string(), (true, expires_at_ms));
        } else {
            flags.remove(key);
        }
        Ok(())
    }

    async fn get_flag(&self, key: &str) -> QuotaResult<bool> {
        self.check_available()?;
        let now_ms = self.clock.now_ms();
        let mut flags = self.flags.lock();
        match flags.get(key) {
            Some((value, None)) => Ok(*value),
            Some((value, Some(expires_at_ms))) => {
                if *expires_at_ms <= now_ms {
                    flags.remove(key);
                    Ok(false)
                } else {
                    Ok(*value)
                }
            }
            None => Ok(false),
        }
    }

    async fn record_violation(
        &self,
        key: &str,
        payload: &str,
        keep: usize,
        _ttl_ms: i64,
    ) -> QuotaResult<()> {
        self.check_available()?;
        let mut violations = self.violations.lock();
        let list = violations.entry(key.to_string()).or_default();
        list.insert(0, payload.to_string());
        list.truncate(keep);
        Ok(())
    }
}
