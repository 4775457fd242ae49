//! Builder for cached functions and properties.

use crate::args::ArgList;
use crate::backend::CacheBackend;
use crate::cached::CachedCore;
use crate::error::{Error, Result};
use crate::function::CachedFunction;
use crate::key::{CacheKeyBuilder, KeyDigest, KeyFn, KeySource};
use crate::property::CachedProperty;
use crate::service::CacheService;
use crate::template::KeyTemplate;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;

/// Per-decorator caching options.
///
/// Deserializable so applications can keep them in their own config files;
/// `ttl` is given in whole seconds there.
///
/// ```
/// use cached_result::builder::CacheOptions;
/// use std::time::Duration;
///
/// let options: CacheOptions = serde_json::from_str(r#"{"ttl": 30, "memoize": true}"#).unwrap();
/// assert_eq!(options.ttl, Some(Duration::from_secs(30)));
/// assert!(options.store);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Passed to the store on every write. `None` falls back to the
    /// service's default TTL, then to the store's own default.
    #[serde(deserialize_with = "ttl_from_secs")]
    pub ttl: Option<Duration>,

    /// Read and write the external store.
    pub store: bool,

    /// Also keep results in an in-process memo owned by the decorator.
    pub memoize: bool,

    /// Digest applied to rendered keys.
    pub digest: KeyDigest,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions {
            ttl: None,
            store: true,
            memoize: false,
            digest: KeyDigest::None,
        }
    }
}

fn ttl_from_secs<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
}

/// Fluent configuration for one cached function or property.
///
/// # Example
///
/// ```
/// use cached_result::{backend::InMemoryBackend, CacheService, Result};
///
/// async fn square((x,): (u32,)) -> Result<u32> {
///     Ok(x * x)
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<()> {
/// let service = CacheService::new(InMemoryBackend::new());
/// let cached_square = service
///     .builder()
///     .key("square_{0}")
///     .name("square")
///     .function(square)?;
///
/// assert_eq!(cached_square.call((4,)).await?, 16);
/// assert_eq!(cached_square.cache_key(&(4,))?, "square_4");
/// # Ok(())
/// # }
/// ```
pub struct CacheBuilder<B: CacheBackend> {
    service: CacheService<B>,
    key: Option<String>,
    key_fn: Option<KeyFn>,
    id: Option<String>,
    name: Option<String>,
    namespace: Option<String>,
    doc: Option<String>,
    options: CacheOptions,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Target {
    Function,
    Property,
}

impl<B: CacheBackend> CacheBuilder<B> {
    pub(crate) fn new(service: CacheService<B>) -> Self {
        CacheBuilder {
            service,
            key: None,
            key_fn: None,
            id: None,
            name: None,
            namespace: None,
            doc: None,
            options: CacheOptions::default(),
        }
    }

    /// Key template, e.g. `"bar_{1}"`. For methods and properties the
    /// receiver is `{0}`.
    pub fn key(mut self, template: impl Into<String>) -> Self {
        self.key = Some(template.into());
        self
    }

    /// Compute keys with a function instead of a template.
    pub fn key_fn<K>(mut self, key_fn: K) -> Self
    where
        K: Fn(&ArgList) -> Result<String> + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    /// Identifier template appended to generated keys
    /// (`"{namespace}.{name}.{id}"`). Only valid without `key`/`key_fn`.
    pub fn id(mut self, template: impl Into<String>) -> Self {
        self.id = Some(template.into());
        self
    }

    /// Name reported by `name()` and used in generated keys.
    ///
    /// Defaults to the item name of a wrapped `fn` (its module path becomes
    /// the namespace when none is set). Closures have no default name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Prefix of generated keys, typically `module_path!()`.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Documentation reported by `doc()`.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.options.ttl = Some(ttl);
        self
    }

    /// Whether to use the external store (default `true`).
    pub fn store(mut self, enabled: bool) -> Self {
        self.options.store = enabled;
        self
    }

    /// Whether to keep an in-process memo (default `false`).
    pub fn memoize(mut self, enabled: bool) -> Self {
        self.options.memoize = enabled;
        self
    }

    pub fn digest(mut self, digest: KeyDigest) -> Self {
        self.options.digest = digest;
        self
    }

    /// Replace all options at once, e.g. with values loaded from config.
    pub fn options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Wrap `func` as a cached function.
    ///
    /// # Errors
    /// - `Error::ConfigError`: conflicting or missing key configuration
    /// - `Error::KeyFormatError`: malformed template
    pub fn function<F>(self, func: F) -> Result<CachedFunction<B, F>> {
        let core = self
            .with_callable_defaults::<F>()
            .into_core(Target::Function)?;
        Ok(CachedFunction::new(core, func))
    }

    /// Wrap `getter` as a cached property.
    ///
    /// # Errors
    /// As [`function`](Self::function), plus `Error::KeyFormatError` when a
    /// template references anything but the receiver `{0}`.
    pub fn property<F>(self, getter: F) -> Result<CachedProperty<B, F>> {
        let core = self
            .with_callable_defaults::<F>()
            .into_core(Target::Property)?;
        Ok(CachedProperty::new(core, getter))
    }

    fn with_callable_defaults<F>(mut self) -> Self {
        if self.name.is_none() {
            if let Some((namespace, name)) = callable_path::<F>() {
                self.namespace.get_or_insert(namespace);
                self.name = Some(name);
            }
        }
        self
    }

    fn into_core(self, target: Target) -> Result<CachedCore<B>> {
        let source = self.key_source(target)?;

        if !self.options.store && !self.options.memoize {
            warn!(
                "⚠ Cache for {} has both store and memoize disabled; every call will compute",
                self.label()
            );
        }

        debug!(
            "Configured cached {} {} ({:?})",
            match target {
                Target::Function => "function",
                Target::Property => "property",
            },
            self.label(),
            source
        );

        Ok(CachedCore::new(
            self.service,
            CacheKeyBuilder::new(source, self.options.digest),
            self.options,
            self.name,
            self.doc,
        ))
    }

    fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.key.as_deref())
            .unwrap_or("<custom key>")
    }

    fn key_source(&self, target: Target) -> Result<KeySource> {
        if self.id.is_some() && (self.key.is_some() || self.key_fn.is_some()) {
            return Err(Error::ConfigError(
                "`id` only applies to generated keys; drop it or drop `key`/`key_fn`".to_string(),
            ));
        }

        match (&self.key, &self.key_fn) {
            (Some(_), Some(_)) => Err(Error::ConfigError(
                "`key` and `key_fn` are mutually exclusive".to_string(),
            )),
            (Some(template), None) => {
                let template = KeyTemplate::parse(template)?;
                if target == Target::Property {
                    check_receiver_only(&template)?;
                }
                Ok(KeySource::Template(template))
            }
            (None, Some(key_fn)) => Ok(KeySource::Custom(Arc::clone(key_fn))),
            (None, None) => {
                let name = self.name.clone().ok_or_else(|| {
                    Error::ConfigError(
                        "a cached function needs a `key`, a `key_fn` or a `name`".to_string(),
                    )
                })?;
                let id = match &self.id {
                    Some(id) => {
                        let template = KeyTemplate::parse(id)?;
                        if target == Target::Property {
                            check_receiver_only(&template)?;
                        }
                        Some(template)
                    }
                    None => {
                        if target == Target::Property {
                            warn!(
                                "⚠ Cached property {} has no `id`; all receivers share one key",
                                name
                            );
                        }
                        None
                    }
                };
                Ok(KeySource::Generated {
                    namespace: self.namespace.clone(),
                    name,
                    id,
                })
            }
        }
    }
}

/// Module path and item name of a `fn` item, read from its type name.
///
/// `app::users::load` yields `("app::users", "load")`; generic arguments are
/// dropped. Closures and function pointers yield `None`.
fn callable_path<F>() -> Option<(String, String)> {
    let full = std::any::type_name::<F>();
    let path = full.split('<').next().unwrap_or(full);
    if path.contains(['{', '(', ' ', '&']) {
        return None;
    }
    let (namespace, name) = path.rsplit_once("::")?;
    if namespace.is_empty() || name.is_empty() {
        return None;
    }
    Some((namespace.to_string(), name.to_string()))
}

fn check_receiver_only(template: &KeyTemplate) -> Result<()> {
    if let Some(index) = template.max_positional_index().filter(|i| *i > 0) {
        return Err(Error::KeyFormatError(format!(
            "property key '{}' references argument {}; properties only receive {{0}}",
            template, index
        )));
    }
    if let Some(name) = template.named_references().first() {
        return Err(Error::KeyFormatError(format!(
            "property key '{}' references named argument '{}'; properties only receive {{0}}",
            template, name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    fn service() -> CacheService<InMemoryBackend> {
        CacheService::new(InMemoryBackend::new())
    }

    async fn noop(_: ()) -> Result<u8> {
        Ok(0)
    }

    #[test]
    fn test_options_default() {
        let options = CacheOptions::default();
        assert_eq!(options.ttl, None);
        assert!(options.store);
        assert!(!options.memoize);
        assert_eq!(options.digest, KeyDigest::None);
    }

    #[test]
    fn test_options_from_config() {
        let options: CacheOptions =
            serde_json::from_str(r#"{"ttl": null, "store": false, "digest": "sha256"}"#)
                .expect("Failed to parse options");
        assert_eq!(options.ttl, None);
        assert!(!options.store);
        assert_eq!(options.digest, KeyDigest::Sha256);
    }

    #[test]
    fn test_key_required_for_closures() {
        let result = service()
            .builder()
            .function(|_: ()| async { Ok::<u8, Error>(0) });
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_name_defaults_to_fn_item() {
        let cached = service().builder().key("n").function(noop).expect("build");
        assert_eq!(cached.name(), Some("noop"));

        let named = service().builder().key("n").name("other").function(noop).expect("build");
        assert_eq!(named.name(), Some("other"));

        let closure = service()
            .builder()
            .key("n")
            .function(|_: ()| async { Ok::<u8, Error>(0) })
            .expect("build");
        assert_eq!(closure.name(), None);
    }

    #[test]
    fn test_generated_key_from_fn_item_path() {
        let cached = service().builder().function(noop).expect("build");
        assert_eq!(
            cached.cache_key(&()).expect("key"),
            format!("{}.noop", module_path!())
        );

        let namespaced = service()
            .builder()
            .namespace("jobs")
            .function(noop)
            .expect("build");
        assert_eq!(namespaced.cache_key(&()).expect("key"), "jobs.noop");
    }

    #[test]
    fn test_callable_path() {
        assert_eq!(callable_path::<fn()>(), None);
        assert_eq!(
            callable_path::<String>(),
            Some(("alloc::string".to_string(), "String".to_string()))
        );
    }

    #[test]
    fn test_key_and_key_fn_conflict() {
        let result = service()
            .builder()
            .key("a_{0}")
            .key_fn(|_: &ArgList| Ok("a".to_string()))
            .function(noop);
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_id_with_explicit_key_rejected() {
        let result = service().builder().key("a_{0}").id("{0}").function(noop);
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_malformed_template_rejected_at_build() {
        let result = service().builder().key("bar_{1").function(noop);
        assert!(matches!(result, Err(Error::KeyFormatError(_))));
    }

    #[test]
    fn test_property_key_must_be_receiver_only() {
        async fn getter(_: &u8) -> Result<u8> {
            Ok(0)
        }

        assert!(matches!(
            service().builder().key("baz_{1}").property(getter),
            Err(Error::KeyFormatError(_))
        ));
        assert!(matches!(
            service().builder().key("baz_{page}").property(getter),
            Err(Error::KeyFormatError(_))
        ));
        assert!(matches!(
            service().builder().name("baz").id("{2}").property(getter),
            Err(Error::KeyFormatError(_))
        ));
        assert!(service().builder().key("baz_{0}").property(getter).is_ok());
        assert!(service().builder().key("baz").property(getter).is_ok());
    }
}
