//! Cache key construction.
//!
//! A [`CacheKeyBuilder`] turns a captured [`ArgList`] into the final key
//! string: render through the configured [`KeySource`], then optionally
//! replace the result by its digest.

use crate::args::ArgList;
use crate::error::Result;
use crate::template::KeyTemplate;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Custom key function: receives the captured arguments, returns the key.
pub type KeyFn = Arc<dyn Fn(&ArgList) -> Result<String> + Send + Sync>;

/// Where a key comes from.
#[derive(Clone)]
pub enum KeySource {
    /// Explicit template, e.g. `"bar_{1}"`.
    Template(KeyTemplate),

    /// `"{namespace}.{name}"` plus an optional `.{id}` rendered from a template.
    ///
    /// Without an `id` every call of the wrapped function shares one key.
    Generated {
        namespace: Option<String>,
        name: String,
        id: Option<KeyTemplate>,
    },

    /// Caller-supplied key function.
    Custom(KeyFn),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Template(t) => f.debug_tuple("Template").field(&t.as_str()).finish(),
            KeySource::Generated {
                namespace,
                name,
                id,
            } => f
                .debug_struct("Generated")
                .field("namespace", namespace)
                .field("name", name)
                .field("id", &id.as_ref().map(KeyTemplate::as_str))
                .finish(),
            KeySource::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Optional digest applied to rendered keys.
///
/// Useful when keys can be long or contain characters a store rejects
/// (Memcached limits keys to 250 bytes without whitespace).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyDigest {
    /// Use the rendered key as is.
    #[default]
    None,
    /// Lowercase hex SHA-256 of the rendered key.
    Sha256,
}

impl KeyDigest {
    pub fn apply(self, key: String) -> String {
        match self {
            KeyDigest::None => key,
            KeyDigest::Sha256 => format!("{:x}", Sha256::digest(key.as_bytes())),
        }
    }
}

/// Builds cache keys for one wrapped function or property.
#[derive(Clone, Debug)]
pub struct CacheKeyBuilder {
    source: KeySource,
    digest: KeyDigest,
}

impl CacheKeyBuilder {
    pub fn new(source: KeySource, digest: KeyDigest) -> Self {
        CacheKeyBuilder { source, digest }
    }

    /// Builder for a plain template.
    ///
    /// # Errors
    /// Returns `Error::KeyFormatError` if the template is malformed.
    pub fn from_template(template: &str) -> Result<Self> {
        Ok(Self::new(
            KeySource::Template(KeyTemplate::parse(template)?),
            KeyDigest::None,
        ))
    }

    pub fn source(&self) -> &KeySource {
        &self.source
    }

    /// Build the key for one call.
    ///
    /// Pure: identical arguments always produce the identical key.
    ///
    /// # Errors
    /// - `Error::KeyFormatError`: the template references an absent argument
    /// - `Error::UnsupportedArgumentTypeError`: a referenced argument has no
    ///   key representation
    pub fn build(&self, args: &ArgList) -> Result<String> {
        let key = match &self.source {
            KeySource::Template(template) => template.render(args)?,
            KeySource::Generated {
                namespace,
                name,
                id,
            } => {
                let mut parts: Vec<String> = Vec::with_capacity(3);
                if let Some(ns) = namespace {
                    parts.push(ns.clone());
                }
                parts.push(name.clone());
                if let Some(id) = id {
                    parts.push(id.render(args)?);
                }
                parts.join(".")
            }
            KeySource::Custom(key_fn) => key_fn(args)?,
        };

        Ok(self.digest.apply(key))
    }
}
