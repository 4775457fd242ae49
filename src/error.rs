//! Error types for cache key construction and cache store access.

use std::fmt;

/// Errors produced while building cache keys or talking to the cache store.
///
/// Errors raised by a wrapped callable never pass through this type unless
/// the callable chooses to return it; they reach the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The key template is malformed, or references an argument position,
    /// name or field that the call did not supply.
    KeyFormatError(String),

    /// A referenced argument could not be rendered into a key fragment.
    UnsupportedArgumentTypeError(String),

    /// A computed value could not be encoded for storage.
    SerializationError(String),

    /// A stored payload could not be decoded into the requested type.
    DeserializationError(String),

    /// A stored entry is not a cached-result envelope (bad magic or truncated).
    InvalidCacheEntry(String),

    /// A stored envelope was written with a different schema version.
    VersionMismatch { expected: u32, found: u32 },

    /// The cache store failed (connection, protocol, rejected key).
    BackendError(String),

    /// Invalid decorator or backend configuration.
    ConfigError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KeyFormatError(msg) => write!(f, "Key format error: {}", msg),
            Error::UnsupportedArgumentTypeError(msg) => {
                write!(f, "Unsupported argument type: {}", msg)
            }
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => write!(
                f,
                "Cache entry version mismatch: expected {}, found {}",
                expected, found
            ),
            Error::BackendError(msg) => write!(f, "Cache backend error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
