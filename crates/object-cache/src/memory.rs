//! In-process memory tier

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;

/// A value held in memory
#[derive(Clone)]
pub(crate) enum MemoryEntry {
    Object(AnyValue),
    /// At least one of `data` and `decoded` is set. `data` is `None` only when
    /// the image could not be encoded.
    Image {
        data: Option<Arc<[u8]>>,
        decoded: Option<AnyValue>,
    },
}

/// Keyed entries plus an epoch that advances on every removal.
///
/// A reader that missed memory remembers the epoch before going to disk and
/// only promotes what it found if the epoch is unchanged, so an invalidation
/// that raced with the disk read is never undone.
#[derive(Default)]
pub(crate) struct MemoryState {
    entries: HashMap<String, MemoryEntry>,
    epoch: u64,
}

impl MemoryState {
    pub fn get(&self, key: &str) -> Option<&MemoryEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn bump_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub fn insert(&mut self, key: &str, entry: MemoryEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.bump_epoch();
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) -> usize {
        self.bump_epoch();
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    /// Insert a value loaded from disk unless memory already holds something
    /// newer for the key or a removal happened since `epoch` was read
    pub fn promote(&mut self, key: &str, entry: MemoryEntry, epoch: u64) -> bool {
        if self.epoch != epoch || self.entries.contains_key(key) {
            return false;
        }
        self.entries.insert(key.to_string(), entry);
        true
    }

    /// Attach a decoded image to the entry still holding exactly `data`
    pub fn memoize_decoded(&mut self, key: &str, data: &Arc<[u8]>, image: AnyValue) {
        if let Some(MemoryEntry::Image {
            data: Some(current),
            decoded,
        }) = self.entries.get_mut(key)
        {
            if Arc::ptr_eq(current, data) {
                *decoded = Some(image);
            }
        }
    }
}

/// Memory tier guarded by a single lock
#[derive(Default)]
pub(crate) struct MemoryTier {
    state: RwLock<MemoryState>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&MemoryState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    pub async fn update<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut state = self.state.write().await;
        f(&mut state)
    }
}
