//! Redis session store
//!
//! Sessions and bookkeeping keys live under a configurable prefix. Tags are
//! Redis sets listing the full keys that carry them, so invalidating a chat is
//! one `SMEMBERS` followed by an atomic `DEL` pipeline.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use crate::config::StorageConfig;
use crate::state::storage::SessionStore;
use crate::utils::errors::{BridgeError, Result};

/// [`SessionStore`] backed by Redis
#[derive(Clone)]
pub struct RedisSessionStore {
    connection_manager: redis::aio::ConnectionManager,
    prefix: String,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    /// Connect using the storage configuration
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| BridgeError::Config("storage.redis_url is not set".to_string()))?;
        let client = redis::Client::open(url)?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            connection_manager,
            prefix: config.prefix.clone(),
            ttl_seconds: config.ttl_seconds,
        })
    }

    /// Test Redis connection
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn tag_key(&self, tag: &str) -> String {
        format!("{}tag:{}", self.prefix, tag)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection_manager.clone();
        let value: Option<String> = conn.get(self.full_key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, tags: &[String]) -> Result<()> {
        let full_key = self.full_key(key);
        let mut pipe = redis::pipe();
        pipe.atomic();

        if self.ttl_seconds > 0 {
            pipe.set_ex(&full_key, value, self.ttl_seconds).ignore();
        } else {
            pipe.set(&full_key, value).ignore();
        }
        for tag in tags {
            pipe.sadd(self.tag_key(tag), &full_key).ignore();
        }

        let mut conn = self.connection_manager.clone();
        pipe.query_async::<_, ()>(&mut conn).await?;
        debug!(key = %full_key, tags = ?tags, "Value stored in Redis");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let _: usize = conn.del(self.full_key(key)).await?;
        Ok(())
    }

    async fn delete_by_tag(&self, tag: &str) -> Result<usize> {
        let tag_key = self.tag_key(tag);
        let mut conn = self.connection_manager.clone();
        let members: Vec<String> = conn.smembers(&tag_key).await?;

        if members.is_empty() {
            let _: usize = conn.del(&tag_key).await?;
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        pipe.atomic().del(&members).del(&tag_key).ignore();
        let (removed,): (usize,) = pipe.query_async(&mut conn).await?;

        debug!(tag = %tag, removed = removed, "Tagged keys invalidated");
        Ok(removed)
    }
}

impl std::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("prefix", &self.prefix)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}
