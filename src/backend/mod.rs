//! Cache store backends.
//!
//! The decorators only ever call `get`, `set` and `delete`. Everything else
//! (connections, expiry, eviction) belongs to the backend.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

#[cfg(feature = "inmemory")]
mod inmemory;
#[cfg(feature = "memcached")]
mod memcached;
#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryBackend;
#[cfg(feature = "memcached")]
pub use memcached::{MemcachedBackend, MemcachedConfig};
#[cfg(feature = "redis")]
pub use self::redis::{RedisBackend, RedisConfig};

/// Key-value store consumed by cached functions and properties.
///
/// Keys are strings, values are opaque envelopes produced by
/// [`crate::serialization`].
pub trait CacheBackend: Send + Sync + 'static {
    /// Fetch the bytes stored under `key`, `None` if absent or expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Store `value` under `key`. `ttl` is passed through; `None` means the
    /// store's default lifetime.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove `key`. Must succeed when the key is absent.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}
