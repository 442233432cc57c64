//! Redis Store Implementation
//!
//! Entries live as TTL-expiring string payloads, the tag index as sets.
//! Pattern deletion walks the keyspace with SCAN/MATCH rather than KEYS so
//! it never blocks the shared store.

use crate::domain::repository::CacheStore;
use crate::error::CacheResult;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Redis-backed cache store
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to Redis and build a store on a managed connection
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn))
    }

    /// Liveness probe used at startup
    pub async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

impl CacheStore for RedisCacheStore {
    async fn get_entry(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(key).await?;
        Ok(payload)
    }

    async fn put_entry(&self, key: &str, payload: &str, ttl_ms: i64) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.pset_ex(key, payload, ttl_ms.max(1) as u64).await?;
        Ok(())
    }

    async fn delete_entry(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn add_tag_member(&self, tag_key: &str, entry_key: &str, ttl_ms: i64) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .sadd(tag_key, entry_key)
            .ignore()
            .pexpire(tag_key, ttl_ms)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn tag_members(&self, tag_key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(tag_key).await?;
        Ok(members)
    }

    async fn delete_tag(&self, tag_key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(tag_key).await?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut scan_conn = self.conn.clone();
        let keys: Vec<String> = {
            let mut iter = scan_conn.scan_match::<_, String>(pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(&keys).await?;
        Ok(deleted.max(0) as u64)
    }
}
