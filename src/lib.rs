//! # cached-result
//!
//! Transparent caching of function and property results in an external
//! key-value store.
//!
//! ## Features
//!
//! - **Templated keys:** `"bar_{1}"`, `"user-{0.id}"`, `"{0}:page={page}"`
//! - **Cached functions and methods:** hit returns the stored value, miss
//!   computes, stores and returns; `delete_cache` with the same arguments
//! - **Cached properties:** receiver-only getters with instance-bound and
//!   explicit-receiver deletion
//! - **Backend agnostic:** in-memory, Redis and Memcached backends, or any
//!   [`CacheBackend`]
//! - **No hidden globals:** every decorator is built from an explicit
//!   [`CacheService`]
//!
//! ## Quick Start
//!
//! ```
//! use cached_result::{backend::InMemoryBackend, CacheService, Result};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Foo;
//!
//! async fn bar(_foo: &Foo, (x,): (u32,)) -> Result<u32> {
//!     println!("Computing bar({})..", x);
//!     Ok(x * x)
//! }
//!
//! async fn baz(_foo: &Foo) -> Result<u32> {
//!     println!("Computing baz..");
//!     Ok(42)
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let service = CacheService::new(InMemoryBackend::new());
//! let foo_bar = service.builder().key("bar_{1}").name("bar").function(bar)?;
//! let foo_baz = service.builder().key("baz").name("baz").property(baz)?;
//!
//! let foo = Foo;
//! assert_eq!(foo_bar.bind(&foo).call((4,)).await?, 16);   // Computing bar(4)..
//! assert_eq!(foo_bar.bind(&foo).call((4,)).await?, 16);   // cached
//! foo_bar.bind(&foo).delete_cache((4,)).await?;
//!
//! assert_eq!(foo_baz.get(&foo).await?, 42);               // Computing baz..
//! foo_baz.delete_cache(&foo).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Limitations
//!
//! Concurrent misses on one key all compute; the last write wins. Store
//! failures surface as call failures, with no retry and no fallback to a
//! direct computation.

#[macro_use]
extern crate log;

pub mod args;
pub mod backend;
pub mod builder;
mod cached;
pub mod error;
pub mod function;
pub mod key;
pub mod observability;
pub mod property;
pub mod serialization;
pub mod service;
pub mod template;

// Re-exports for convenience
pub use args::{ArgList, KeyArgs, Named};
pub use backend::CacheBackend;
pub use builder::{CacheBuilder, CacheOptions};
pub use error::{Error, Result};
pub use function::{BoundFunction, CachedFunction};
pub use key::{CacheKeyBuilder, KeyDigest};
pub use observability::{CacheMetrics, NoOpMetrics};
pub use property::{BoundProperty, CachedProperty};
pub use service::CacheService;
pub use template::KeyTemplate;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
