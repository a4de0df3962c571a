//! Redis-backed [`CacheStore`].

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::fmt;
use tracing::{debug, info};

use super::{CacheError, CacheStore};

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        info!(url = %redis_url, "Connecting to cache");

        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        debug!(key, "Cache GET");
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        debug!(key, "Cache SET");
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        debug!(key, "Cache DELETE");
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        debug!(pattern, "Cache DELETE pattern");
        let mut conn = self.conn.clone();

        let keys: Vec<String> = conn.keys::<_, Vec<String>>(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        debug!(count = keys.len(), pattern, "Deleting keys matching pattern");
        let deleted: u64 = conn.del::<_, u64>(keys).await?;
        Ok(deleted)
    }

    async fn hget(&self, hash: &str, field: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.hget::<_, _, Option<String>>(hash, field).await?)
    }

    async fn push(&self, list: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(list, value).await?;
        Ok(())
    }

    async fn drain(&self, list: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let (values,): (Vec<String>,) = redis::pipe()
            .atomic()
            .lrange(list, 0, -1)
            .del(list)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }
}
