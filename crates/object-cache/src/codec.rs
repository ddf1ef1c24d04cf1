//! Conversion of storable objects to and from their on-disk form
//!
//! Objects are written as a small envelope: the magic bytes `OCOB`, a format
//! version byte, then the serialized payload. Image bytes never pass through
//! here; they are stored exactly as the image codec produced them.

use crate::error::{CacheError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;

const MAGIC: &[u8; 4] = b"OCOB";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 1;

/// A value that can be kept in the cache and persisted to disk.
///
/// Implemented for every `serde` type. Decoding must produce a value that
/// behaves like the original; it need not be the same instance.
pub trait Storable: Any + Send + Sync + Sized {
    fn to_bytes(&self) -> Result<Vec<u8>>;

    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

impl<T> Storable for T
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

/// Encode an object into its enveloped on-disk form
pub fn encode_object<T: Storable>(object: &T) -> Result<Vec<u8>> {
    let payload = object.to_bytes()?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode an object from its enveloped on-disk form
pub fn decode_object<T: Storable>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < HEADER_LEN {
        return Err(CacheError::Deserialization(format!(
            "blob too short: {} bytes",
            bytes.len()
        )));
    }
    if !is_object_blob(bytes) {
        return Err(CacheError::Deserialization(
            "missing object envelope".to_string(),
        ));
    }

    let version = bytes[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(CacheError::Deserialization(format!(
            "unsupported format version {}",
            version
        )));
    }

    T::from_bytes(&bytes[HEADER_LEN..])
}

/// Whether a blob was written by [`encode_object`]
fn is_object_blob(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Bookmark {
        url: String,
        title: Option<String>,
        visits: u32,
    }

    fn bookmark() -> Bookmark {
        Bookmark {
            url: "https://example.com".to_string(),
            title: Some("Example".to_string()),
            visits: 3,
        }
    }

    #[test]
    fn test_encode_decode() {
        let bytes = encode_object(&bookmark()).unwrap();
        assert!(bytes.starts_with(b"OCOB"));
        assert_eq!(bytes[4], FORMAT_VERSION);

        let decoded: Bookmark = decode_object(&bytes).unwrap();
        assert_eq!(decoded, bookmark());
    }

    #[test]
    fn test_non_storable_nested_state() {
        // JSON object keys must be strings
        let mut grid: HashMap<(u8, u8), u8> = HashMap::new();
        grid.insert((0, 1), 7);

        let err = encode_object(&grid).unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }

    #[test]
    fn test_truncated_header() {
        let err = decode_object::<Bookmark>(b"OCO").unwrap_err();
        assert!(matches!(err, CacheError::Deserialization(_)));
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = encode_object(&bookmark()).unwrap();
        let err = decode_object::<Bookmark>(&bytes[..bytes.len() - 4]).unwrap_err();
        assert!(matches!(err, CacheError::Deserialization(_)));
    }

    #[test]
    fn test_wrong_magic() {
        let err = decode_object::<Bookmark>(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).unwrap_err();
        assert!(err.to_string().contains("missing object envelope"));
    }

    #[test]
    fn test_unknown_version() {
        let mut bytes = encode_object(&bookmark()).unwrap();
        bytes[4] = 9;

        let err = decode_object::<Bookmark>(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported format version 9"));
    }

    #[test]
    fn test_wrong_type() {
        let bytes = encode_object(&"just a string".to_string()).unwrap();
        assert!(decode_object::<Bookmark>(&bytes).is_err());
    }

    #[test]
    fn test_is_object_blob() {
        assert!(is_object_blob(&encode_object(&42u32).unwrap()));
        assert!(!is_object_blob(&[0x89, b'P', b'N', b'G']));
        assert!(!is_object_blob(&[]));
    }
}
