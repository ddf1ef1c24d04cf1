//! Keyed blob storage on the local filesystem
//!
//! Defines the [`BlobStore`] contract used as the durable tier of a cache and
//! a file-per-key implementation, [`FileBlobStore`]. Missing blobs are a normal
//! outcome (`Ok(None)`), never an error.

mod error;
mod store;

pub use error::{BlobStoreError, Result};
pub use store::{BlobStore, FileBlobStore};
