//! Redis-backed cache store.
//!
//! Semantics mirror [`MemoryStore`](super::MemoryStore): JSON values, a
//! miss is `Ok(None)`, ttl zero means no expiration, tags are sets of key
//! names, and `delete_pattern` takes the same shell-style globs `SCAN
//! MATCH` understands.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use super::store::{CacheError, CacheStore};

pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::backend)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(CacheError::backend)
    }

    async fn matching_keys(
        &self,
        conn: &mut MultiplexedConnection,
        pattern: &str,
    ) -> Result<Vec<String>, CacheError> {
        let mut keys = Vec::new();
        let mut iter = conn
            .scan_match::<_, String>(pattern)
            .await
            .map_err(CacheError::backend)?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(CacheError::backend)?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        if ttl.is_zero() {
            let _: () = conn
                .set(key, value.as_ref())
                .await
                .map_err(CacheError::backend)?;
        } else {
            let _: () = conn
                .pset_ex(key, value.as_ref(), ttl.as_millis() as u64)
                .await
                .map_err(CacheError::backend)?;
        }
        Ok(())
    }

    async fn set_with_tags(
        &self,
        key: &str,
        value: Bytes,
        ttl: Duration,
        tags: &[&str],
    ) -> Result<(), CacheError> {
        self.set(key, value, ttl).await?;
        let mut conn = self.connection().await?;
        for tag in tags {
            let _: () = conn.sadd(*tag, key).await.map_err(CacheError::backend)?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await.map_err(CacheError::backend)?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let keys = self.matching_keys(&mut conn, pattern).await?;
        if !keys.is_empty() {
            let _: () = conn.del(keys).await.map_err(CacheError::backend)?;
        }
        Ok(())
    }

    async fn invalidate_by_tags(&self, tags: &[&str]) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        for tag in tags {
            let members: Vec<String> = conn.smembers(*tag).await.map_err(CacheError::backend)?;
            if !members.is_empty() {
                let _: () = conn.del(members).await.map_err(CacheError::backend)?;
            }
            let _: () = conn.del(*tag).await.map_err(CacheError::backend)?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        conn.exists(key).await.map_err(CacheError::backend)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let mut conn = self.connection().await?;
        conn.incr(key, 1i64).await.map_err(CacheError::backend)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        conn.pexpire(key, ttl.as_millis() as i64)
            .await
            .map_err(CacheError::backend)
    }
}
