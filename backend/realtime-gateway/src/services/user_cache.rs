use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::metrics::{record_cache_hit, record_cache_miss, track_cache_operation};
use crate::models::UserIdentity;

use super::stores::UserDirectory;

#[async_trait]
pub trait IdentityCache: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserIdentity>>;
    async fn set(&self, identity: &UserIdentity) -> Result<()>;
    async fn invalidate(&self, user_id: &str) -> Result<()>;
}

/// Read-through cache of resolved identities so every handshake does not hit Mongo
#[derive(Clone)]
pub struct UserCache {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

pub fn cache_key(user_id: &str) -> String {
    format!("user:identity:{}", user_id)
}

impl UserCache {
    pub fn new(redis: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }
}

#[async_trait]
impl IdentityCache for UserCache {
    async fn get(&self, user_id: &str) -> Result<Option<UserIdentity>> {
        let mut conn = self.redis.clone();
        let key = cache_key(user_id);

        let cached: Option<String> = track_cache_operation("get", async {
            redis::cmd("GET")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .context("Failed to read identity cache")
        })
        .await?;

        match cached {
            Some(json) => {
                record_cache_hit();
                let identity =
                    serde_json::from_str(&json).context("Failed to deserialize cached identity")?;
                Ok(Some(identity))
            }
            None => {
                record_cache_miss();
                Ok(None)
            }
        }
    }

    async fn set(&self, identity: &UserIdentity) -> Result<()> {
        let mut conn = self.redis.clone();
        let key = cache_key(&identity.user_id);
        let json = serde_json::to_string(identity).context("Failed to serialize identity")?;

        track_cache_operation("set", async {
            redis::cmd("SETEX")
                .arg(&key)
                .arg(self.ttl_seconds)
                .arg(&json)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to cache identity")
        })
        .await
    }

    async fn invalidate(&self, user_id: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let key = cache_key(user_id);

        track_cache_operation("del", async {
            redis::cmd("DEL")
                .arg(&key)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to invalidate identity cache")
        })
        .await
    }
}

/// Cache-aside wrapper around a user directory.
///
/// Only `{userId, name, role}` is cached, so `lastSeen` writes leave the
/// cached entry in place. Cache failures fall back to the directory, and a
/// user the directory no longer returns is evicted.
pub struct CachedUserDirectory {
    inner: Arc<dyn UserDirectory>,
    cache: Arc<dyn IdentityCache>,
}

impl CachedUserDirectory {
    pub fn new(inner: Arc<dyn UserDirectory>, cache: Arc<dyn IdentityCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl UserDirectory for CachedUserDirectory {
    async fn find_identity(&self, user_id: &str) -> Result<Option<UserIdentity>> {
        match self.cache.get(user_id).await {
            Ok(Some(identity)) => return Ok(Some(identity)),
            Ok(None) => {}
            Err(e) => tracing::warn!(user_id, "Identity cache unavailable: {:#}", e),
        }

        let identity = self.inner.find_identity(user_id).await?;
        let refreshed = match &identity {
            Some(identity) => self.cache.set(identity).await,
            None => self.cache.invalidate(user_id).await,
        };
        if let Err(e) = refreshed {
            tracing::warn!(user_id, "Failed to refresh identity cache: {:#}", e);
        }
        Ok(identity)
    }

    async fn touch_last_seen(&self, user_id: &str) -> Result<()> {
        self.inner.touch_last_seen(user_id).await
    }
}
