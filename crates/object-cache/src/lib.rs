//! Two-tier object cache
//!
//! A keyed cache that keeps values in process memory and persists them to
//! disk. Reads are served from memory when possible and fall back to disk,
//! promoting what they find. Images have their own paths that store encoded
//! bytes directly instead of going through object serialization.
//!
//! Caching is best effort: a value that cannot be read back is reported as a
//! miss, and failures to persist are logged rather than returned.

mod cache;
mod codec;
mod config;
mod error;
mod image_codec;
mod memory;
mod types;
mod writer;

pub use cache::ObjectCache;
pub use codec::Storable;
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use image_codec::{ImageCodec, ImageFormat, RasterCodec};
pub use types::CacheStats;

pub use file_blob_store::{BlobStore, BlobStoreError, FileBlobStore};
