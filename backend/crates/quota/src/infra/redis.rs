//! Redis Store Implementation
//!
//! Backs counters, connection sets, flags and violation retention with a
//! shared Redis instance. Every compound operation runs as a MULTI/EXEC
//! pipeline so concurrent replicas never lose updates.

use crate::domain::repository::QuotaStore;
use crate::error::QuotaResult;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Redis-backed quota store
#[derive(Clone)]
pub struct RedisQuotaStore {
    conn: ConnectionManager,
}

impl RedisQuotaStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to Redis and build a store on a managed connection
    pub async fn connect(url: &str) -> QuotaResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn))
    }

    /// Liveness probe used at startup; failure is survivable (the caller
    /// decides between fail-open and fail-closed per request)
    pub async fn ping(&self) -> QuotaResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

impl QuotaStore for RedisQuotaStore {
    async fn increment_window(&self, key: &str, expire_ms: i64) -> QuotaResult<u64> {
        let mut conn = self.conn.clone();
        // INCR and PEXPIRE in one transaction: the counter can never exist
        // without an expiry
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1i64)
            .pexpire(key, expire_ms)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn add_connection(
        &self,
        set_key: &str,
        member: &str,
        expires_at_ms: i64,
        now_ms: i64,
        key_ttl_ms: i64,
    ) -> QuotaResult<u64> {
        let mut conn = self.conn.clone();
        // Member score is its expiry; pruning is a score-range removal
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .zrembyscore(set_key, "-inf", now_ms)
            .ignore()
            .zadd(set_key, member, expires_at_ms)
            .ignore()
            .zcard(set_key)
            .pexpire(set_key, key_ttl_ms)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn remove_connection(&self, set_key: &str, member: &str) -> QuotaResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.zrem(set_key, member).await?;
        Ok(())
    }

    async fn connection_count(&self, set_key: &str, now_ms: i64) -> QuotaResult<u64> {
        let mut conn = self.conn.clone();
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .zrembyscore(set_key, "-inf", now_ms)
            .ignore()
            .zcard(set_key)
            .query_async(&mut conn)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn set_flag(&self, key: &str, value: bool, ttl_ms: Option<i64>) -> QuotaResult<()> {
        let mut conn = self.conn.clone();
        if !value {
            let _: i64 = conn.del(key).await?;
            return Ok(());
        }
        match ttl_ms {
            Some(ttl_ms) => {
                let _: () = conn.pset_ex(key, "1", ttl_ms.max(1) as u64).await?;
            }
            None => {
                let _: () = conn.set(key, "1").await?;
            }
        }
        Ok(())
    }

    async fn get_flag(&self, key: &str) -> QuotaResult<bool> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value.as_deref() == Some("1"))
    }

    async fn record_violation(
        &self,
        key: &str,
        payload: &str,
        keep: usize,
        ttl_ms: i64,
    ) -> QuotaResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .lpush(key, payload)
            .ignore()
            .ltrim(key, 0, keep.saturating_sub(1) as isize)
            .ignore()
            .pexpire(key, ttl_ms)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
