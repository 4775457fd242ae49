//! Cached functions and methods.

use crate::args::{ArgList, KeyArgs};
use crate::backend::CacheBackend;
use crate::cached::CachedCore;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;

/// A function whose results are cached under a key rendered from its
/// arguments.
///
/// The wrapped function takes its arguments as one tuple and returns
/// `Result<T, E>` with `E: From<cached_result::Error>`, so key and store
/// failures surface through the function's own error type while its own
/// errors pass through untouched.
///
/// # Example
///
/// ```
/// use cached_result::{backend::InMemoryBackend, CacheService, Result};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Foo;
///
/// async fn bar(_foo: &Foo, (x,): (u32,)) -> Result<u32> {
///     Ok(x * x)
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<()> {
/// let service = CacheService::new(InMemoryBackend::new());
/// let cached_bar = service.builder().key("bar_{1}").name("bar").function(bar)?;
///
/// let foo = Foo;
/// assert_eq!(cached_bar.bind(&foo).call((4,)).await?, 16);  // computed
/// assert_eq!(cached_bar.bind(&foo).call((4,)).await?, 16);  // cached under "bar_4"
/// cached_bar.bind(&foo).delete_cache((4,)).await?;
/// # Ok(())
/// # }
/// ```
pub struct CachedFunction<B: CacheBackend, F> {
    core: CachedCore<B>,
    func: F,
}

impl<B: CacheBackend, F> CachedFunction<B, F> {
    pub(crate) fn new(core: CachedCore<B>, func: F) -> Self {
        CachedFunction { core, func }
    }

    /// Configured name of the wrapped function.
    pub fn name(&self) -> Option<&str> {
        self.core.name()
    }

    /// Configured documentation of the wrapped function.
    pub fn doc(&self) -> Option<&str> {
        self.core.doc()
    }

    /// The wrapped function, for calls that must bypass the cache.
    pub fn inner(&self) -> &F {
        &self.func
    }

    /// Key a call with `args` would use.
    ///
    /// # Errors
    /// `Error::KeyFormatError` or `Error::UnsupportedArgumentTypeError`.
    pub fn cache_key<A: KeyArgs + ?Sized>(&self, args: &A) -> Result<String> {
        self.core.key(ArgList::collect(args))
    }

    /// Return the cached result for `args`, computing and storing it on a miss.
    pub async fn call<A, T, E, Fut>(&self, args: A) -> std::result::Result<T, E>
    where
        A: KeyArgs,
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize + DeserializeOwned,
        E: From<Error>,
    {
        let key = self.cache_key(&args)?;
        self.core.get_or_compute(&key, || (self.func)(args)).await
    }

    /// Compute `args` unconditionally and overwrite the cached value.
    pub async fn refresh<A, T, E, Fut>(&self, args: A) -> std::result::Result<T, E>
    where
        A: KeyArgs,
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize,
        E: From<Error>,
    {
        let key = self.cache_key(&args)?;
        self.core.recompute(&key, || (self.func)(args)).await
    }

    /// Delete the cached result for `args` without calling the function.
    ///
    /// Deleting a key that is not cached is a no-op.
    pub async fn delete_cache<A: KeyArgs>(&self, args: A) -> Result<()> {
        let key = self.cache_key(&args)?;
        self.core.evict(&key).await
    }

    /// View of this function as a method of `receiver`.
    ///
    /// The receiver is passed to the wrapped function first and is argument
    /// `{0}` of the key template.
    pub fn bind<'r, R>(&'r self, receiver: &'r R) -> BoundFunction<'r, B, F, R>
    where
        R: Serialize + ?Sized,
    {
        BoundFunction {
            function: self,
            receiver,
        }
    }
}

impl<B: CacheBackend, F> fmt::Debug for CachedFunction<B, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedFunction")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// A [`CachedFunction`] bound to a receiver.
pub struct BoundFunction<'r, B: CacheBackend, F, R: ?Sized> {
    function: &'r CachedFunction<B, F>,
    receiver: &'r R,
}

impl<'r, B, F, R> BoundFunction<'r, B, F, R>
where
    B: CacheBackend,
    R: Serialize + ?Sized,
{
    pub fn receiver(&self) -> &'r R {
        self.receiver
    }

    pub fn name(&self) -> Option<&str> {
        self.function.name()
    }

    pub fn doc(&self) -> Option<&str> {
        self.function.doc()
    }

    /// Key a call with `args` on this receiver would use.
    ///
    /// # Errors
    /// `Error::KeyFormatError` or `Error::UnsupportedArgumentTypeError`.
    pub fn cache_key<A: KeyArgs + ?Sized>(&self, args: &A) -> Result<String> {
        self.function
            .core
            .key(ArgList::with_receiver(self.receiver, args))
    }

    /// Return the cached result for `args`, computing and storing it on a miss.
    pub async fn call<A, T, E, Fut>(&self, args: A) -> std::result::Result<T, E>
    where
        A: KeyArgs,
        F: Fn(&'r R, A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize + DeserializeOwned,
        E: From<Error>,
    {
        let key = self.cache_key(&args)?;
        let receiver = self.receiver;
        self.function
            .core
            .get_or_compute(&key, || (self.function.func)(receiver, args))
            .await
    }

    /// Compute unconditionally and overwrite the cached value.
    pub async fn refresh<A, T, E, Fut>(&self, args: A) -> std::result::Result<T, E>
    where
        A: KeyArgs,
        F: Fn(&'r R, A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize,
        E: From<Error>,
    {
        let key = self.cache_key(&args)?;
        let receiver = self.receiver;
        self.function
            .core
            .recompute(&key, || (self.function.func)(receiver, args))
            .await
    }

    /// Delete the cached result for `args` on this receiver.
    pub async fn delete_cache<A: KeyArgs>(&self, args: A) -> Result<()> {
        let key = self.cache_key(&args)?;
        self.function.core.evict(&key).await
    }
}
