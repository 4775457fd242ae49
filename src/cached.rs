//! Lookup, compute and store logic shared by cached functions and properties.

use crate::args::ArgList;
use crate::backend::CacheBackend;
use crate::builder::CacheOptions;
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::serialization::{deserialize_from_cache, serialize_for_cache};
use crate::service::CacheService;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;

pub(crate) struct CachedCore<B: CacheBackend> {
    service: CacheService<B>,
    keys: CacheKeyBuilder,
    options: CacheOptions,
    // key -> encoded envelope; only populated when `options.memoize`
    memo: DashMap<String, Vec<u8>>,
    name: Option<String>,
    doc: Option<String>,
}

impl<B: CacheBackend> CachedCore<B> {
    pub(crate) fn new(
        service: CacheService<B>,
        keys: CacheKeyBuilder,
        options: CacheOptions,
        name: Option<String>,
        doc: Option<String>,
    ) -> Self {
        CachedCore {
            service,
            keys,
            options,
            memo: DashMap::new(),
            name,
            doc,
        }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Convert a crate error into the caller's error type, reporting it.
    pub(crate) fn fail<E: From<Error>>(&self, key: &str, error: Error) -> E {
        debug!("✗ Cache operation failed for {}: {}", key, error);
        self.service.metrics().record_error(key, &error.to_string());
        E::from(error)
    }

    /// Build the key for `args`, reporting failures to the metrics sink.
    pub(crate) fn key(&self, args: Result<ArgList>) -> Result<String> {
        args.and_then(|args| self.keys.build(&args))
            .map_err(|e| self.fail(self.label(), e))
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if self.options.memoize {
            let memoized = self.memo.get(key).map(|bytes| bytes.value().clone());
            if let Some(bytes) = memoized {
                debug!("✓ Memo hit for {}", key);
                return deserialize_from_cache(&bytes).map(Some);
            }
        }

        if !self.options.store {
            return Ok(None);
        }

        match self.service.backend().get(key).await? {
            Some(bytes) => {
                let value = deserialize_from_cache(&bytes)?;
                if self.options.memoize {
                    self.memo.insert(key.to_string(), bytes);
                }
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serialize_for_cache(value)?;

        if self.options.store {
            self.service
                .set_raw(key, bytes.clone(), self.options.ttl)
                .await?;
            debug!("✓ Stored result for {}", key);
        }
        if self.options.memoize {
            self.memo.insert(key.to_string(), bytes);
        }
        Ok(())
    }

    /// Serve `key` from cache, or run `compute` and cache its result.
    ///
    /// A failed compute is returned unchanged and nothing is written.
    pub(crate) async fn get_or_compute<T, E, Fut>(
        &self,
        key: &str,
        compute: impl FnOnce() -> Fut,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<Error>,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let timer = Instant::now();
        debug!("» Cached call {} for key: {}", self.label(), key);

        match self.lookup::<T>(key).await {
            Ok(Some(value)) => {
                self.service.metrics().record_hit(key, timer.elapsed());
                debug!("✓ Cache hit for {} in {:?}", key, timer.elapsed());
                return Ok(value);
            }
            Ok(None) => {
                self.service.metrics().record_miss(key, timer.elapsed());
                debug!("✗ Cache miss for {}, computing", key);
            }
            Err(e) => return Err(self.fail(key, e)),
        }

        let value = compute().await?;
        self.save(key, &value).await.map_err(|e| self.fail(key, e))?;
        Ok(value)
    }

    /// Run `compute` unconditionally and overwrite the cached value.
    pub(crate) async fn recompute<T, E, Fut>(
        &self,
        key: &str,
        compute: impl FnOnce() -> Fut,
    ) -> std::result::Result<T, E>
    where
        T: Serialize,
        E: From<Error>,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        debug!("» Refreshing {} for key: {}", self.label(), key);
        let value = compute().await?;
        self.save(key, &value).await.map_err(|e| self.fail(key, e))?;
        Ok(value)
    }

    /// Remove `key` from the memo and the store. Absent keys are fine.
    pub(crate) async fn evict(&self, key: &str) -> Result<()> {
        self.memo.remove(key);
        if self.options.store {
            self.service
                .delete(key)
                .await
                .map_err(|e| self.fail::<Error>(key, e))?;
        }
        self.service.metrics().record_delete(key);
        debug!("✓ Cache deleted for {}", key);
        Ok(())
    }
}
