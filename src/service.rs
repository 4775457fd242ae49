//! Shared cache client handle.

use crate::backend::CacheBackend;
use crate::builder::CacheBuilder;
use crate::error::Result;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::serialization::{deserialize_from_cache, serialize_for_cache};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Cache client passed explicitly to every cached function and property.
///
/// Cloning is cheap (`Arc` increments), so one service is typically built at
/// startup and cloned into each decorator.
///
/// # Example
///
/// ```
/// use cached_result::{backend::InMemoryBackend, CacheService};
/// use std::time::Duration;
///
/// let service = CacheService::new(InMemoryBackend::new())
///     .with_default_ttl(Duration::from_secs(300));
/// let per_request = service.clone();
/// assert_eq!(per_request.default_ttl(), Some(Duration::from_secs(300)));
/// ```
pub struct CacheService<B: CacheBackend> {
    backend: Arc<B>,
    metrics: Arc<dyn CacheMetrics>,
    default_ttl: Option<Duration>,
}

impl<B: CacheBackend> Clone for CacheService<B> {
    fn clone(&self) -> Self {
        CacheService {
            backend: Arc::clone(&self.backend),
            metrics: Arc::clone(&self.metrics),
            default_ttl: self.default_ttl,
        }
    }
}

impl<B: CacheBackend> CacheService<B> {
    /// Create a service owning `backend`.
    pub fn new(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    /// Create a service around an already shared backend.
    pub fn from_arc(backend: Arc<B>) -> Self {
        CacheService {
            backend,
            metrics: Arc::new(NoOpMetrics),
            default_ttl: None,
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// TTL used by decorators that do not set their own.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    pub(crate) fn metrics(&self) -> &dyn CacheMetrics {
        self.metrics.as_ref()
    }

    /// Start configuring a cached function or property.
    pub fn builder(&self) -> CacheBuilder<B> {
        CacheBuilder::new(self.clone())
    }

    /// Read and decode the value stored under `key`.
    ///
    /// # Errors
    /// Backend failures and envelope decoding errors are returned as is.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get(key).await? {
            Some(bytes) => deserialize_from_cache(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Encode and store `value` under `key`.
    ///
    /// # Errors
    /// Returns `Error::SerializationError` or the backend's error.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let bytes = serialize_for_cache(value)?;
        self.set_raw(key, bytes, ttl).await
    }

    pub(crate) async fn set_raw(
        &self,
        key: &str,
        bytes: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.backend.set(key, bytes, ttl.or(self.default_ttl)).await
    }

    /// Delete `key`; absent keys are not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.backend.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::error::Error;

    #[tokio::test]
    async fn test_service_roundtrip_through_envelope() {
        let backend = InMemoryBackend::new();
        let service = CacheService::new(backend.clone());

        service
            .set("greeting", &"hello".to_string(), None)
            .await
            .expect("Failed to set");

        let raw = backend
            .get("greeting")
            .await
            .expect("Failed to get")
            .expect("Entry missing");
        assert_eq!(&raw[..4], b"CRES");

        let value: Option<String> = service.get("greeting").await.expect("Failed to get");
        assert_eq!(value.as_deref(), Some("hello"));

        service.delete("greeting").await.expect("Failed to delete");
        let value: Option<String> = service.get("greeting").await.expect("Failed to get");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_foreign_entry_is_an_error() {
        let backend = InMemoryBackend::new();
        backend
            .set("foreign", b"not an envelope".to_vec(), None)
            .await
            .expect("Failed to set");

        let service = CacheService::new(backend);
        let result: Result<Option<u32>> = service.get("foreign").await;
        assert!(matches!(result, Err(Error::InvalidCacheEntry(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_applies() {
        let backend = InMemoryBackend::new();
        let service =
            CacheService::new(backend.clone()).with_default_ttl(Duration::from_secs(10));

        service.set("k", &1u8, None).await.expect("Failed to set");
        service
            .set("pinned", &2u8, Some(Duration::from_secs(60)))
            .await
            .expect("Failed to set");

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!backend.contains_key("k"));
        assert!(backend.contains_key("pinned"));
    }
}
