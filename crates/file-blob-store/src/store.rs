//! File-per-key blob storage

use crate::error::{BlobStoreError, Result};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Keyed byte storage backing the durable cache tier.
///
/// Implementations must report a missing key as `Ok(None)` from `get` and as
/// success from `delete`. Storage may change underneath the store at any time,
/// so implementations must not remember absence between calls.
pub trait BlobStore: Send + Sync + 'static {
    /// Store `bytes` under `key`, replacing any previous blob
    fn put(&self, key: &str, bytes: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Load the blob stored under `key`
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Remove the blob stored under `key`
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Remove every blob
    fn delete_all(&self) -> impl Future<Output = Result<()>> + Send;

    /// Check whether a blob is currently stored under `key`
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.get(key).await?.is_some()) }
    }
}

/// Blob store keeping one file per key inside a directory.
///
/// File names are the hex SHA-256 of the key, so arbitrary key strings map to
/// safe, fixed-length names. Writes go to a temporary file that is renamed
/// over the target, so readers never observe a partially written blob.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Create a store rooted at `dir`. Nothing touches the filesystem until
    /// [`init`](Self::init) or the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Ensure the storage directory exists
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        info!(dir = ?self.dir, "Blob store initialized");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name used for a key
    pub fn file_name(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Whether `name` is a blob file (or an in-progress temp file) this
    /// store could have written
    fn is_blob_file_name(name: &str) -> bool {
        let stem = name.strip_suffix(".tmp").unwrap_or(name);
        stem.len() == 64 && stem.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(Self::file_name(key))
    }

    fn checked_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(BlobStoreError::InvalidKey(
                "key must not be empty".to_string(),
            ));
        }
        Ok(self.path_for(key))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}

impl BlobStore for FileBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.checked_path(key)?;

        match self.write_atomic(&path, bytes).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Directory was removed externally
                fs::create_dir_all(&self.dir).await?;
                self.write_atomic(&path, bytes).await?;
            }
            Err(e) => return Err(e.into()),
        }

        debug!(key, size = bytes.len(), "Stored blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.checked_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.checked_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_all(&self) -> Result<()> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            // Leave files this store never wrote alone
            let name = entry.file_name();
            if !name.to_str().is_some_and(Self::is_blob_file_name) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(dir = ?self.dir, removed, "Deleted all blobs");
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.checked_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}
