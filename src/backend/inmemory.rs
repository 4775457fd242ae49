//! Process-local cache backend.

use super::CacheBackend;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Debug)]
struct StoredEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// In-memory backend backed by a `DashMap`.
///
/// Clones share the same map. Expired entries are dropped lazily on read.
/// Expiry follows the tokio clock, so paused-time tests can advance past a
/// TTL without sleeping.
///
/// # Example
///
/// ```
/// # use cached_result::backend::{CacheBackend, InMemoryBackend};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> cached_result::Result<()> {
/// let backend = InMemoryBackend::new();
/// backend.set("bar_4", b"16".to_vec(), None).await?;
/// assert_eq!(backend.get("bar_4").await?, Some(b"16".to_vec()));
/// backend.delete("bar_4").await?;
/// assert!(backend.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, StoredEntry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until next read.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Whether `key` holds a live entry.
    pub fn contains_key(&self, key: &str) -> bool {
        self.store
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.store.clear();
        debug!("✓ InMemory CLEAR");
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let expired = match self.store.get(key) {
            Some(entry) if !entry.is_expired() => {
                debug!("✓ InMemory GET {} -> HIT", key);
                return Ok(Some(entry.data.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.store.remove_if(key, |_, entry| entry.is_expired());
            debug!("✓ InMemory GET {} -> EXPIRED", key);
        } else {
            debug!("✓ InMemory GET {} -> MISS", key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let entry = StoredEntry {
            data: value,
            expires_at: ttl.map(|d| Instant::now() + d),
        };
        self.store.insert(key.to_string(), entry);

        if let Some(d) = ttl {
            debug!("✓ InMemory SET {} (TTL: {:?})", key, d);
        } else {
            debug!("✓ InMemory SET {}", key);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = InMemoryBackend::new();

        backend
            .set("k", b"v".to_vec(), None)
            .await
            .expect("Failed to set");
        assert_eq!(
            backend.get("k").await.expect("Failed to get"),
            Some(b"v".to_vec())
        );

        backend.delete("k").await.expect("Failed to delete");
        assert_eq!(backend.get("k").await.expect("Failed to get"), None);
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_noop() {
        let backend = InMemoryBackend::new();
        backend.delete("missing").await.expect("Failed to delete");
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let backend = InMemoryBackend::new();
        let other = backend.clone();

        backend
            .set("shared", vec![1, 2, 3], None)
            .await
            .expect("Failed to set");
        assert!(other.contains_key("shared"));
        assert_eq!(other.len(), 1);

        other.clear();
        assert!(backend.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let backend = InMemoryBackend::new();
        backend
            .set("short", vec![1], Some(Duration::from_millis(100)))
            .await
            .expect("Failed to set");

        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(backend.get("short").await.expect("get").is_some());

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(backend.get("short").await.expect("get").is_none());
        assert!(backend.is_empty());
    }
}
