use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands};
use tracing::debug;

use crate::application::services::cache_client::{
    CacheClient, CacheError, CacheWrite, WatchSession,
};

impl From<redis::RedisError> for CacheError {
    fn from(error: redis::RedisError) -> Self {
        if error.is_io_error() || error.is_connection_dropped() || error.is_timeout() {
            CacheError::Connection(error.to_string())
        } else {
            CacheError::Command(error.to_string())
        }
    }
}

/// Redis only has whole-second TTLs here; anything shorter is rounded up.
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Maps the TTL reply: -2 is a missing key, -1 a key without expiration.
fn remaining(ttl: i64) -> Option<Duration> {
    (ttl >= 0).then(|| Duration::from_secs(ttl as u64))
}

pub struct RedisCacheClient {
    client: redis::Client,
    manager: redis::aio::ConnectionManager,
}

impl RedisCacheClient {
    pub fn new(client: redis::Client, manager: redis::aio::ConnectionManager) -> Self {
        Self { client, manager }
    }
}

#[async_trait]
impl CacheClient for RedisCacheClient {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds(ttl)).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let mut conn = self.manager.clone();
        Ok(conn.incr(key, 1i64).await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        Ok(conn.expire(key, ttl_seconds(ttl) as i64).await?)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut conn = self.manager.clone();
        let ttl: i64 = conn.ttl(key).await?;
        Ok(remaining(ttl))
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        let mut conn = self.manager.clone();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok((next, keys))
    }

    /// WATCH state belongs to a connection, so each attempt gets its own
    /// instead of sharing the multiplexed manager.
    async fn watch(&self, keys: &[String]) -> Result<Box<dyn WatchSession>, CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = redis::cmd("WATCH").arg(keys).query_async(&mut conn).await?;
        Ok(Box::new(RedisWatch { conn }))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

struct RedisWatch {
    conn: MultiplexedConnection,
}

#[async_trait]
impl WatchSession for RedisWatch {
    async fn get(&mut self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.conn.get(key).await?)
    }

    async fn ttl(&mut self, key: &str) -> Result<Option<Duration>, CacheError> {
        let ttl: i64 = self.conn.ttl(key).await?;
        Ok(remaining(ttl))
    }

    async fn exec(mut self: Box<Self>, writes: Vec<CacheWrite>) -> Result<bool, CacheError> {
        if writes.is_empty() {
            let _: () = redis::cmd("UNWATCH").query_async(&mut self.conn).await?;
            return Ok(true);
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for write in writes {
            match write {
                CacheWrite::Set {
                    key,
                    value,
                    ttl: Some(ttl),
                } => {
                    pipe.set_ex(key, value, ttl_seconds(ttl)).ignore();
                }
                CacheWrite::Set {
                    key,
                    value,
                    ttl: None,
                } => {
                    pipe.set(key, value).ignore();
                }
                CacheWrite::Delete { key } => {
                    pipe.del(key).ignore();
                }
            }
        }

        // EXEC answers nil when a watched key changed.
        let applied: Option<()> = pipe.query_async(&mut self.conn).await?;
        if applied.is_none() {
            debug!("Watched transaction aborted by a concurrent write");
        }
        Ok(applied.is_some())
    }
}
