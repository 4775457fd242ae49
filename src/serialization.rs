//! Envelope format for cached values.
//!
//! ```text
//! [MAGIC: 4 bytes] [VERSION: 4 bytes, little endian] [POSTCARD PAYLOAD]
//! ```
//!
//! The header lets a reader reject foreign data sharing the store and
//! entries written by an incompatible schema instead of misdecoding them.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Envelope magic.
pub const CACHE_MAGIC: [u8; 4] = *b"CRES";

/// Envelope schema version. Bump when the payload layout changes.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

/// Encode `value` for storage.
///
/// # Errors
/// Returns `Error::SerializationError` if postcard cannot encode the value.
pub fn serialize_for_cache<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(value)
        .map_err(|e| Error::SerializationError(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&CACHE_MAGIC);
    bytes.extend_from_slice(&CACHE_SCHEMA_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a stored envelope.
///
/// # Errors
/// - `Error::InvalidCacheEntry`: truncated header or wrong magic
/// - `Error::VersionMismatch`: written under another schema version
/// - `Error::DeserializationError`: payload does not decode as `T`
pub fn deserialize_from_cache<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::InvalidCacheEntry(format!(
            "entry is {} bytes, shorter than the {} byte header",
            bytes.len(),
            HEADER_LEN
        )));
    }

    let (header, payload) = bytes.split_at(HEADER_LEN);
    if header[..4] != CACHE_MAGIC {
        return Err(Error::InvalidCacheEntry(format!(
            "bad magic {:?}",
            &header[..4]
        )));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&header[4..]);
    let found = u32::from_le_bytes(version);
    if found != CACHE_SCHEMA_VERSION {
        return Err(Error::VersionMismatch {
            expected: CACHE_SCHEMA_VERSION,
            found,
        });
    }

    postcard::from_bytes(payload).map_err(|e| Error::DeserializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u32,
        nickname: Option<String>,
    }

    #[test]
    fn test_envelope_header() {
        let bytes = serialize_for_cache(&16u32).expect("serialize");
        assert_eq!(&bytes[..4], b"CRES");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
    }

    #[test]
    fn test_struct_value_survives_storage() {
        let profile = Profile {
            name: "Wade".to_string(),
            visits: 3,
            nickname: None,
        };
        let bytes = serialize_for_cache(&profile).expect("serialize");
        let decoded: Profile = deserialize_from_cache(&bytes).expect("deserialize");
        assert_eq!(decoded, profile);
    }

    #[test]
    fn test_truncated_entry() {
        let result: Result<u32> = deserialize_from_cache(b"CRE");
        assert!(matches!(result, Err(Error::InvalidCacheEntry(_))));
    }

    #[test]
    fn test_foreign_entry() {
        let result: Result<u32> = deserialize_from_cache(b"plain text value");
        assert!(matches!(result, Err(Error::InvalidCacheEntry(_))));
    }

    #[test]
    fn test_version_mismatch() {
        let mut bytes = serialize_for_cache(&1u8).expect("serialize");
        bytes[4..8].copy_from_slice(&9u32.to_le_bytes());
        let result: Result<u8> = deserialize_from_cache(&bytes);
        assert_eq!(
            result,
            Err(Error::VersionMismatch {
                expected: 1,
                found: 9
            })
        );
    }

    #[test]
    fn test_wrong_payload_type() {
        let bytes = serialize_for_cache(&Vec::<u8>::new()).expect("serialize");
        let result: Result<Profile> = deserialize_from_cache(&bytes);
        assert!(matches!(result, Err(Error::DeserializationError(_))));
    }
}
