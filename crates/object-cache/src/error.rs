//! Error types for the object cache

use file_blob_store::BlobStoreError;
use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    /// A value could not be encoded for the disk tier
    Serialization(String),
    /// Stored bytes could not be decoded (corrupt, truncated or wrong version)
    Deserialization(String),
    /// The disk tier failed for environmental reasons
    Io(BlobStoreError),
    Config(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            CacheError::Deserialization(msg) => write!(f, "Deserialization error: {}", msg),
            CacheError::Io(err) => write!(f, "Storage error: {}", err),
            CacheError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BlobStoreError> for CacheError {
    fn from(err: BlobStoreError) -> Self {
        CacheError::Io(err)
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(BlobStoreError::from(err))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
