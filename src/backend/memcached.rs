//! Memcached cache backend implementation.

use super::CacheBackend;
use crate::error::{Error, Result};
use async_memcached::AsciiProtocol;
use deadpool_memcached::{Manager, Pool};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Pool size used when `MEMCACHED_POOL_SIZE` is unset or invalid.
const DEFAULT_POOL_SIZE: u32 = 16;

/// Longest key the Memcached text protocol accepts.
const MAX_KEY_LEN: usize = 250;

/// Largest exptime memcached reads as relative seconds (30 days). Anything
/// above is an absolute Unix timestamp.
const MAX_RELATIVE_EXPIRATION: u64 = 30 * 24 * 60 * 60;

/// Where and how wide the Memcached pool is.
#[derive(Clone, Debug)]
pub struct MemcachedConfig {
    pub server: String,
    pub pool_size: u32,
}

impl MemcachedConfig {
    /// Config for `server`, pool size taken from `MEMCACHED_POOL_SIZE`.
    pub fn for_server(server: impl Into<String>) -> Self {
        MemcachedConfig {
            server: server.into(),
            pool_size: pool_size_from_env(),
        }
    }
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        Self::for_server("localhost:11211")
    }
}

fn pool_size_from_env() -> u32 {
    std::env::var("MEMCACHED_POOL_SIZE")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_POOL_SIZE)
}

/// Memcached backend over a deadpool connection pool.
///
/// Rendered keys are checked against the protocol's key rules before any
/// round trip; templates that can produce spaces or very long keys should be
/// combined with [`KeyDigest::Sha256`](crate::key::KeyDigest).
///
/// # Example
///
/// ```no_run
/// # use cached_result::backend::{MemcachedBackend, MemcachedConfig};
/// # use cached_result::{CacheService, Result};
/// # async fn example() -> Result<()> {
/// let backend = MemcachedBackend::new(MemcachedConfig::for_server("cache1:11211"))?;
/// let service = CacheService::new(backend);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemcachedBackend {
    pool: Pool,
}

impl MemcachedBackend {
    /// Build the pool. Connections are opened on first use.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the pool cannot be built.
    pub fn new(config: MemcachedConfig) -> Result<Self> {
        if config.server.trim().is_empty() {
            return Err(Error::ConfigError("memcached server address is empty".to_string()));
        }

        let pool = Pool::builder(Manager::new(config.server.clone()))
            .max_size(config.pool_size as usize)
            .build()
            .map_err(|e| Error::ConfigError(format!("memcached pool for {}: {}", config.server, e)))?;

        info!(
            "✓ Memcached cache store ready at {} ({} connections)",
            config.server, config.pool_size
        );

        Ok(MemcachedBackend { pool })
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(Error::BackendError(format!(
            "Memcached keys must be 1..={} bytes, got {} (consider a key digest)",
            MAX_KEY_LEN,
            key.len()
        )));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::BackendError(format!(
            "Memcached key {:?} contains whitespace or control characters",
            key
        )));
    }
    Ok(())
}

/// Memcached exptime for `ttl`: relative seconds up to 30 days, an absolute
/// Unix timestamp beyond that.
fn expiration(ttl: Option<Duration>) -> Option<i64> {
    expiration_at(ttl, SystemTime::now())
}

fn expiration_at(ttl: Option<Duration>, now: SystemTime) -> Option<i64> {
    let secs = ttl?.as_secs().max(1);
    if secs <= MAX_RELATIVE_EXPIRATION {
        return Some(secs as i64);
    }
    let epoch = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    Some(epoch.saturating_add(secs) as i64)
}

fn checkout_error(e: impl std::fmt::Display) -> Error {
    Error::BackendError(format!("memcached connection unavailable: {}", e))
}

fn command_error(command: &str, key: &str, e: impl std::fmt::Display) -> Error {
    Error::BackendError(format!("memcached {} {}: {}", command, key, e))
}

impl CacheBackend for MemcachedBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let mut conn = self.pool.get().await.map_err(checkout_error)?;

        match conn.get(key).await {
            Ok(Some(value)) => {
                debug!("✓ memcached hit {}", key);
                Ok(value.data)
            }
            Ok(None) => {
                debug!("✗ memcached miss {}", key);
                Ok(None)
            }
            Err(e) => Err(command_error("GET", key, e)),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        let mut conn = self.pool.get().await.map_err(checkout_error)?;

        let expiration = expiration(ttl);

        conn.set(key, value.as_slice(), expiration, None)
            .await
            .map_err(|e| command_error("SET", key, e))?;

        debug!("✓ memcached stored {} (expiration: {:?})", key, expiration);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let mut conn = self.pool.get().await.map_err(checkout_error)?;

        match conn.delete(key).await {
            Ok(()) => {
                debug!("✓ memcached deleted {}", key);
                Ok(())
            }
            // NOT_FOUND means there was nothing to delete
            Err(e) if e.to_string().to_lowercase().contains("not found") => {
                debug!("✓ memcached delete {}: already absent", key);
                Ok(())
            }
            Err(e) => Err(command_error("DELETE", key, e)),
        }
    }
}
