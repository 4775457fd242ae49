//! Cached properties: lazily computed, receiver-only values.

use crate::args::ArgList;
use crate::backend::CacheBackend;
use crate::cached::CachedCore;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;

/// A getter whose result is cached per receiver.
///
/// The key template may only reference the receiver (`{0}`, `{0.id}`, ...).
/// Deletion is available on the property itself with an explicit receiver
/// ([`delete_cache`](Self::delete_cache)) and on a bound view
/// ([`BoundProperty::delete`]); both remove the same key.
///
/// # Example
///
/// ```
/// use cached_result::{backend::InMemoryBackend, CacheService, Result};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Foo { id: u32 }
///
/// async fn baz(_foo: &Foo) -> Result<u32> {
///     Ok(42)
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<()> {
/// let service = CacheService::new(InMemoryBackend::new());
/// let foo_baz = service.builder().key("baz_{0.id}").property(baz)?;
///
/// let foo = Foo { id: 1 };
/// assert_eq!(foo_baz.get(&foo).await?, 42);
/// foo_baz.delete_cache(&foo).await?;
/// # Ok(())
/// # }
/// ```
pub struct CachedProperty<B: CacheBackend, F> {
    core: CachedCore<B>,
    getter: F,
}

impl<B: CacheBackend, F> CachedProperty<B, F> {
    pub(crate) fn new(core: CachedCore<B>, getter: F) -> Self {
        CachedProperty { core, getter }
    }

    pub fn name(&self) -> Option<&str> {
        self.core.name()
    }

    pub fn doc(&self) -> Option<&str> {
        self.core.doc()
    }

    /// Key used for `receiver`.
    ///
    /// # Errors
    /// `Error::KeyFormatError` or `Error::UnsupportedArgumentTypeError`.
    pub fn cache_key<R: Serialize + ?Sized>(&self, receiver: &R) -> Result<String> {
        self.core.key(ArgList::with_receiver(receiver, &()))
    }

    /// Read the property of `receiver`, computing and storing it on a miss.
    pub async fn get<'r, R, T, E, Fut>(&self, receiver: &'r R) -> std::result::Result<T, E>
    where
        R: Serialize + ?Sized,
        F: Fn(&'r R) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize + DeserializeOwned,
        E: From<Error>,
    {
        let key = self.cache_key(receiver)?;
        self.core
            .get_or_compute(&key, || (self.getter)(receiver))
            .await
    }

    /// Recompute the property of `receiver` and overwrite the cached value.
    pub async fn refresh<'r, R, T, E, Fut>(&self, receiver: &'r R) -> std::result::Result<T, E>
    where
        R: Serialize + ?Sized,
        F: Fn(&'r R) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize,
        E: From<Error>,
    {
        let key = self.cache_key(receiver)?;
        self.core.recompute(&key, || (self.getter)(receiver)).await
    }

    /// Delete the cached value of `receiver` without a bound view.
    ///
    /// No-op when nothing is cached.
    pub async fn delete_cache<R: Serialize + ?Sized>(&self, receiver: &R) -> Result<()> {
        let key = self.cache_key(receiver)?;
        self.core.evict(&key).await
    }

    /// View of this property on `receiver`.
    pub fn bind<'r, R>(&'r self, receiver: &'r R) -> BoundProperty<'r, B, F, R>
    where
        R: Serialize + ?Sized,
    {
        BoundProperty {
            property: self,
            receiver,
        }
    }
}

impl<B: CacheBackend, F> fmt::Debug for CachedProperty<B, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedProperty")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// A [`CachedProperty`] bound to one receiver.
pub struct BoundProperty<'r, B: CacheBackend, F, R: ?Sized> {
    property: &'r CachedProperty<B, F>,
    receiver: &'r R,
}

impl<'r, B, F, R> BoundProperty<'r, B, F, R>
where
    B: CacheBackend,
    R: Serialize + ?Sized,
{
    pub fn cache_key(&self) -> Result<String> {
        self.property.cache_key(self.receiver)
    }

    pub async fn get<T, E, Fut>(&self) -> std::result::Result<T, E>
    where
        F: Fn(&'r R) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize + DeserializeOwned,
        E: From<Error>,
    {
        self.property.get(self.receiver).await
    }

    pub async fn refresh<T, E, Fut>(&self) -> std::result::Result<T, E>
    where
        F: Fn(&'r R) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize,
        E: From<Error>,
    {
        self.property.refresh(self.receiver).await
    }

    /// Delete this receiver's cached value.
    pub async fn delete(&self) -> Result<()> {
        self.property.delete_cache(self.receiver).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::service::CacheService;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Serialize)]
    struct Account {
        id: u64,
        #[serde(skip)]
        loads: AtomicUsize,
    }

    impl Account {
        fn new(id: u64) -> Self {
            Account {
                id,
                loads: AtomicUsize::new(0),
            }
        }
    }

    async fn balance(account: &Account) -> Result<i64> {
        account.loads.fetch_add(1, Ordering::SeqCst);
        Ok(account.id as i64 * 100)
    }

    #[tokio::test]
    async fn test_property_cached_per_receiver() {
        let service = CacheService::new(InMemoryBackend::new());
        let account_balance = service
            .builder()
            .key("balance_{0.id}")
            .property(balance)
            .expect("Failed to build");

        let first = Account::new(1);
        let second = Account::new(2);

        assert_eq!(account_balance.get(&first).await.expect("get"), 100);
        assert_eq!(account_balance.get(&second).await.expect("get"), 200);
        assert_eq!(account_balance.get(&first).await.expect("get"), 100);

        assert_eq!(first.loads.load(Ordering::SeqCst), 1);
        assert_eq!(second.loads.load(Ordering::SeqCst), 1);
        assert_eq!(
            account_balance.cache_key(&second).expect("key"),
            "balance_2"
        );
    }

    #[tokio::test]
    async fn test_bound_delete_only_affects_its_receiver() {
        let service = CacheService::new(InMemoryBackend::new());
        let account_balance = service
            .builder()
            .key("balance_{0.id}")
            .property(balance)
            .expect("Failed to build");

        let first = Account::new(1);
        let second = Account::new(2);
        account_balance.get(&first).await.expect("get");
        account_balance.get(&second).await.expect("get");

        account_balance.bind(&first).delete().await.expect("delete");

        account_balance.get(&first).await.expect("get");
        account_balance.get(&second).await.expect("get");
        assert_eq!(first.loads.load(Ordering::SeqCst), 2);
        assert_eq!(second.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bound_refresh() {
        let service = CacheService::new(InMemoryBackend::new());
        let account_balance = service
            .builder()
            .key("balance_{0.id}")
            .property(balance)
            .expect("Failed to build");

        let account = Account::new(3);
        let bound = account_balance.bind(&account);
        assert_eq!(bound.get().await.expect("get"), 300);
        assert_eq!(bound.refresh().await.expect("refresh"), 300);
        assert_eq!(account.loads.load(Ordering::SeqCst), 2);
        assert_eq!(bound.cache_key().expect("key"), "balance_3");
    }
}
