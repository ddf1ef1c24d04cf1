//! Two-tier cache façade
//!
//! Writes land in memory immediately and are queued for disk. Reads try
//! memory first, then disk, promoting disk hits back into memory. Any disk or
//! decoding failure on the read path is reported as a plain miss, and write
//! path failures are logged and counted but never returned to the caller.
//!
//! Objects and images share one key namespace but live under separate disk
//! keys, so image bytes are stored verbatim and never mistaken for objects.
//! Writing either kind discards the other kind's blob for the same key.

use crate::codec::{self, Storable};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::image_codec::{ImageCodec, RasterCodec};
use crate::memory::{MemoryEntry, MemoryTier};
use crate::types::{CacheStats, Counters};
use crate::writer::DiskWriter;
use file_blob_store::{BlobStore, FileBlobStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keyed object cache over a memory tier and a disk tier.
///
/// Build one per process at startup and share it behind an `Arc`. Must be
/// constructed inside a Tokio runtime, which runs the disk writer task.
pub struct ObjectCache<C: ImageCodec = RasterCodec, S: BlobStore = FileBlobStore> {
    /// Values held in process memory
    memory: MemoryTier,
    /// Disk tier, read directly by callers
    store: Arc<S>,
    /// Ordered queue of disk mutations
    writer: DiskWriter,
    /// Encoder for the image paths
    codec: C,
    /// Hit, miss and failure counters
    counters: Arc<Counters>,
}

/// Kind of blob kept on disk for a cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlobKind {
    Object,
    Image,
}

impl BlobKind {
    /// Key used in the disk tier for `key`
    fn disk_key(self, key: &str) -> String {
        match self {
            BlobKind::Object => format!("object:{}", key),
            BlobKind::Image => format!("image:{}", key),
        }
    }

    fn other(self) -> Self {
        match self {
            BlobKind::Object => BlobKind::Image,
            BlobKind::Image => BlobKind::Object,
        }
    }
}

impl ObjectCache {
    /// Open a file-backed cache, creating the cache directory if needed
    pub async fn open(config: CacheConfig) -> Result<Self> {
        let store = FileBlobStore::new(&config.cache_dir);
        store.init().await?;

        info!(
            cache_dir = ?config.cache_dir,
            image_format = %config.image_format,
            "Object cache opened"
        );

        Ok(Self::with_parts(
            RasterCodec::new(config.image_format),
            store,
        ))
    }
}

impl<C: ImageCodec, S: BlobStore> ObjectCache<C, S> {
    /// Build a cache from an image codec and a disk tier
    pub fn with_parts(codec: C, store: S) -> Self {
        let store = Arc::new(store);
        let counters = Arc::new(Counters::default());
        let writer = DiskWriter::spawn(store.clone(), counters.clone());

        Self {
            memory: MemoryTier::new(),
            store,
            writer,
            codec,
            counters,
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store an object under `key`, replacing whatever the key held
    pub async fn cache_object<T: Storable>(&self, key: &str, object: T) {
        if !is_valid_key(key) {
            return;
        }

        let encoded = codec::encode_object(&object);
        let entry = MemoryEntry::Object(Arc::new(object));

        self.memory
            .update(|m| {
                m.insert(key, entry);
                // Queue while holding the lock so disk sees writes in memory order
                match encoded {
                    Ok(bytes) => self.queue_put(BlobKind::Object, key, bytes.into()),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Failed to encode cache entry, keeping it in memory only");
                        self.counters.write_failure();
                        // Disk must not keep an older value than memory
                        self.queue_discard(key);
                    }
                }
            })
            .await;
    }

    /// Look up an object of type `T`
    ///
    /// Returns `None` when nothing is cached, when the entry cannot be read or
    /// decoded, or when the key holds a different kind of value.
    pub async fn cached_object<T: Storable>(&self, key: &str) -> Option<Arc<T>> {
        if key.is_empty() {
            return None;
        }

        let (entry, epoch) = self
            .memory
            .read(|m| (m.get(key).cloned(), m.epoch()))
            .await;

        if let Some(entry) = entry {
            let value = match entry {
                MemoryEntry::Object(value) => value.downcast::<T>().ok(),
                MemoryEntry::Image { .. } => None,
            };
            match &value {
                Some(_) => {
                    debug!(key = %key, "Memory hit");
                    self.counters.memory_hit();
                }
                None => {
                    debug!(key = %key, "Cached value has a different type");
                    self.counters.miss();
                }
            }
            return value;
        }

        let bytes = self.load_from_disk(BlobKind::Object, key).await?;
        let value = match codec::decode_object::<T>(&bytes) {
            Ok(value) => Arc::new(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Unreadable cache entry on disk");
                self.counters.miss();
                return None;
            }
        };

        let promoted = self
            .memory
            .update(|m| m.promote(key, MemoryEntry::Object(value.clone()), epoch))
            .await;
        debug!(key = %key, promoted, "Disk hit");
        self.counters.disk_hit();

        Some(value)
    }

    /// Store an image under `key`, persisting it in the codec's encoding
    pub async fn cache_image(&self, key: &str, image: C::Image) {
        if !is_valid_key(key) {
            return;
        }

        let data: Option<Arc<[u8]>> = match self.codec.encode(&image) {
            Ok(bytes) => Some(bytes.into()),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode image, keeping it in memory only");
                self.counters.write_failure();
                None
            }
        };
        let entry = MemoryEntry::Image {
            data: data.clone(),
            decoded: Some(Arc::new(image)),
        };

        self.memory
            .update(|m| {
                m.insert(key, entry);
                match data {
                    Some(bytes) => self.queue_put(BlobKind::Image, key, bytes),
                    None => self.queue_discard(key),
                }
            })
            .await;
    }

    /// Look up an image, decoding it from its stored bytes if necessary
    pub async fn cached_image(&self, key: &str) -> Option<Arc<C::Image>> {
        if key.is_empty() {
            return None;
        }

        let (entry, epoch) = self
            .memory
            .read(|m| (m.get(key).cloned(), m.epoch()))
            .await;

        match entry {
            Some(MemoryEntry::Image {
                decoded: Some(decoded),
                ..
            }) => {
                let image = decoded.downcast::<C::Image>().ok();
                if image.is_some() {
                    debug!(key = %key, "Memory hit");
                    self.counters.memory_hit();
                } else {
                    self.counters.miss();
                }
                return image;
            }
            Some(MemoryEntry::Image {
                data: Some(data),
                decoded: None,
            }) => {
                let image = self.decode_image(key, &data)?;
                self.memory
                    .update(|m| m.memoize_decoded(key, &data, image.clone()))
                    .await;
                debug!(key = %key, "Memory hit");
                self.counters.memory_hit();
                return Some(image);
            }
            Some(_) => {
                debug!(key = %key, "Cached value is not an image");
                self.counters.miss();
                return None;
            }
            None => {}
        }

        let bytes = self.load_from_disk(BlobKind::Image, key).await?;
        let data: Arc<[u8]> = bytes.into();
        let image = self.decode_image(key, &data)?;

        let promoted = self
            .memory
            .update(|m| {
                m.promote(
                    key,
                    MemoryEntry::Image {
                        data: Some(data),
                        decoded: Some(image.clone()),
                    },
                    epoch,
                )
            })
            .await;
        debug!(key = %key, promoted, "Disk hit");
        self.counters.disk_hit();

        Some(image)
    }

    /// Store already-encoded image bytes under `key`
    pub async fn cache_image_data(&self, key: &str, data: impl Into<Vec<u8>>) {
        if !is_valid_key(key) {
            return;
        }

        let data: Arc<[u8]> = data.into().into();
        let entry = MemoryEntry::Image {
            data: Some(data.clone()),
            decoded: None,
        };

        self.memory
            .update(|m| {
                m.insert(key, entry);
                self.queue_put(BlobKind::Image, key, data);
            })
            .await;
    }

    /// Look up encoded image bytes exactly as they were stored
    pub async fn cached_image_data(&self, key: &str) -> Option<Vec<u8>> {
        if key.is_empty() {
            return None;
        }

        let (entry, epoch) = self
            .memory
            .read(|m| (m.get(key).cloned(), m.epoch()))
            .await;

        match entry {
            Some(MemoryEntry::Image {
                data: Some(data), ..
            }) => {
                debug!(key = %key, "Memory hit");
                self.counters.memory_hit();
                return Some(data.to_vec());
            }
            Some(_) => {
                debug!(key = %key, "No encoded image bytes for key");
                self.counters.miss();
                return None;
            }
            None => {}
        }

        let bytes = self.load_from_disk(BlobKind::Image, key).await?;
        let data: Arc<[u8]> = Arc::from(bytes.as_slice());

        let promoted = self
            .memory
            .update(|m| {
                m.promote(
                    key,
                    MemoryEntry::Image {
                        data: Some(data),
                        decoded: None,
                    },
                    epoch,
                )
            })
            .await;
        debug!(key = %key, promoted, "Disk hit");
        self.counters.disk_hit();

        Some(bytes)
    }

    /// Remove `key` from both tiers. Returns once the disk entry is gone.
    pub async fn invalidate(&self, key: &str) {
        if key.is_empty() {
            return;
        }

        let pending = self
            .memory
            .update(|m| {
                m.remove(key);
                (
                    self.writer.delete(&BlobKind::Object.disk_key(key)),
                    self.writer.delete(&BlobKind::Image.disk_key(key)),
                )
            })
            .await;
        pending.0.wait().await;
        pending.1.wait().await;

        // Reads that started before the deletion finished must not promote
        self.memory.update(|m| m.bump_epoch()).await;
        debug!(key = %key, "Invalidated cache entry");
    }

    /// Remove every entry from both tiers
    pub async fn invalidate_all(&self) {
        let (dropped, pending) = self
            .memory
            .update(|m| (m.clear(), self.writer.delete_all()))
            .await;
        pending.wait().await;

        self.memory.update(|m| m.bump_epoch()).await;
        info!(memory_entries = dropped, "Invalidated all cache entries");
    }

    /// Drop the memory tier, keeping everything on disk.
    ///
    /// Intended for low-memory signals from the host. Later reads are served
    /// from disk and promoted again.
    pub async fn purge_memory(&self) {
        // Pending writes must reach disk first or purged values would be lost
        self.flush().await;
        let dropped = self.memory.update(|m| m.clear()).await;
        info!(memory_entries = dropped, "Purged memory tier");
    }

    /// Wait until every write queued so far has been applied to disk
    pub async fn flush(&self) {
        self.writer.flush().wait().await;
    }

    /// Whether either tier currently holds `key`
    pub async fn contains(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        if self.memory.read(|m| m.contains(key)).await {
            return true;
        }
        for kind in [BlobKind::Object, BlobKind::Image] {
            match self.store.exists(&kind.disk_key(key)).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to check disk cache");
                }
            }
        }
        false
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = self.memory.read(|m| m.len()).await;
        self.counters.snapshot(entries)
    }

    /// Queue `bytes` as the `kind` blob for `key` and drop the other kind
    fn queue_put(&self, kind: BlobKind, key: &str, bytes: Arc<[u8]>) {
        self.writer.put(&kind.disk_key(key), bytes);
        self.writer.discard(&kind.other().disk_key(key));
    }

    /// Queue removal of every blob for `key`
    fn queue_discard(&self, key: &str) {
        self.writer.discard(&BlobKind::Object.disk_key(key));
        self.writer.discard(&BlobKind::Image.disk_key(key));
    }

    async fn load_from_disk(&self, kind: BlobKind, key: &str) -> Option<Vec<u8>> {
        match self.store.get(&kind.disk_key(key)).await {
            Ok(Some(bytes)) => Some(bytes),
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                self.counters.miss();
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cache entry from disk");
                self.counters.miss();
                None
            }
        }
    }

    fn decode_image(&self, key: &str, data: &[u8]) -> Option<Arc<C::Image>> {
        match self.codec.decode(data) {
            Ok(image) => Some(Arc::new(image)),
            Err(e) => {
                warn!(key = %key, error = %e, "Unreadable cached image");
                self.counters.miss();
                None
            }
        }
    }
}

fn is_valid_key(key: &str) -> bool {
    if key.is_empty() {
        warn!("Ignoring cache write with an empty key");
        return false;
    }
    true
}
