//! Redis cache backend implementation.

use super::CacheBackend;
use crate::error::{Error, Result};
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use std::time::Duration;

/// Default Redis connection pool size.
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: usize = 16;

/// Configuration for Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://localhost:6379/0`.
    pub url: String,
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        RedisConfig {
            url: "redis://localhost:6379".to_string(),
            pool_size,
        }
    }
}

/// Redis backend over a deadpool connection pool.
///
/// TTLs are rounded down to whole seconds (minimum one) and stored with
/// `SET ... EX`; without a TTL the key persists until deleted or evicted by
/// the server.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create new Redis backend from configuration.
    ///
    /// The pool connects lazily; an unreachable server surfaces as
    /// `Error::BackendError` on the first cache access.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the URL or pool settings are invalid.
    pub fn new(config: RedisConfig) -> Result<Self> {
        let mut cfg = Config::from_url(config.url.clone());
        cfg.pool = Some(PoolConfig::new(config.pool_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create Redis pool: {}", e)))?;

        info!(
            "✓ Redis backend initialized for {} (pool size: {})",
            config.url, config.pool_size
        );

        Ok(RedisBackend { pool })
    }

    /// Create from a connection URL with the default pool size.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the URL is invalid.
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        Self::new(RedisConfig {
            url: url.into(),
            ..Default::default()
        })
    }
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("Failed to get Redis connection: {}", e))
        })?;

        let value: Option<Vec<u8>> = conn.get(key).await.map_err(|e| {
            Error::BackendError(format!("Redis GET failed for key {}: {}", key, e))
        })?;

        debug!(
            "✓ Redis GET {} -> {}",
            key,
            if value.is_some() { "HIT" } else { "MISS" }
        );
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("Failed to get Redis connection: {}", e))
        })?;

        let result: std::result::Result<(), _> = match ttl {
            Some(d) => conn.set_ex(key, value, d.as_secs().max(1)).await,
            None => conn.set(key, value).await,
        };
        result.map_err(|e| {
            Error::BackendError(format!("Redis SET failed for key {}: {}", key, e))
        })?;

        debug!("✓ Redis SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("Failed to get Redis connection: {}", e))
        })?;

        // DEL returns the number of removed keys; zero is fine
        let removed: u64 = conn.del(key).await.map_err(|e| {
            Error::BackendError(format!("Redis DELETE failed for key {}: {}", key, e))
        })?;

        debug!("✓ Redis DELETE {} (removed: {})", key, removed);
        Ok(())
    }
}
