//! Background persistence for the disk tier
//!
//! Every disk mutation goes through one queue drained by a single task, so
//! operations are applied in the order they were submitted. Writes to the
//! same key can therefore never overtake each other.

use crate::types::Counters;
use file_blob_store::BlobStore;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum DiskOp {
    Put { key: String, bytes: Arc<[u8]> },
    Delete { key: String, done: oneshot::Sender<()> },
    DeleteAll { done: oneshot::Sender<()> },
    Flush { done: oneshot::Sender<()> },
}

/// Completion signal for a queued disk operation
pub(crate) struct Pending(Option<oneshot::Receiver<()>>);

impl Pending {
    /// Wait until the operation has been applied (or the writer is gone)
    pub async fn wait(self) {
        if let Some(rx) = self.0 {
            if rx.await.is_err() {
                warn!("Disk writer stopped before acknowledging operation");
            }
        }
    }
}

/// Handle to the disk writer task
pub(crate) struct DiskWriter {
    /// Queue drained by the writer task
    tx: mpsc::UnboundedSender<DiskOp>,
}

impl DiskWriter {
    /// Spawn the writer task on the current Tokio runtime
    pub fn spawn<S: BlobStore>(store: Arc<S>, counters: Arc<Counters>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(store, rx, counters));
        Self { tx }
    }

    /// Queue a blob for persistence without waiting for it
    pub fn put(&self, key: &str, bytes: Arc<[u8]>) {
        self.send(DiskOp::Put {
            key: key.to_string(),
            bytes,
        });
    }

    /// Queue a deletion without waiting for it
    pub fn discard(&self, key: &str) {
        drop(self.delete(key));
    }

    pub fn delete(&self, key: &str) -> Pending {
        let (done, rx) = oneshot::channel();
        self.submit(
            DiskOp::Delete {
                key: key.to_string(),
                done,
            },
            rx,
        )
    }

    pub fn delete_all(&self) -> Pending {
        let (done, rx) = oneshot::channel();
        self.submit(DiskOp::DeleteAll { done }, rx)
    }

    /// Resolves once every operation queued before it has been applied
    pub fn flush(&self) -> Pending {
        let (done, rx) = oneshot::channel();
        self.submit(DiskOp::Flush { done }, rx)
    }

    fn submit(&self, op: DiskOp, rx: oneshot::Receiver<()>) -> Pending {
        if self.send(op) {
            Pending(Some(rx))
        } else {
            Pending(None)
        }
    }

    fn send(&self, op: DiskOp) -> bool {
        if self.tx.send(op).is_err() {
            warn!("Disk writer is not running, dropping disk operation");
            return false;
        }
        true
    }
}

async fn run<S: BlobStore>(
    store: Arc<S>,
    mut rx: mpsc::UnboundedReceiver<DiskOp>,
    counters: Arc<Counters>,
) {
    while let Some(op) = rx.recv().await {
        match op {
            DiskOp::Put { key, bytes } => {
                if let Err(e) = store.put(&key, &bytes).await {
                    warn!(key = %key, error = %e, "Failed to persist cache entry");
                    counters.write_failure();
                    // An older blob left behind would outlive the newer value in memory
                    if let Err(e) = store.delete(&key).await {
                        warn!(key = %key, error = %e, "Failed to remove stale cache entry after failed write");
                    }
                }
            }
            DiskOp::Delete { key, done } => {
                if let Err(e) = store.delete(&key).await {
                    warn!(key = %key, error = %e, "Failed to delete cache entry from disk");
                    counters.write_failure();
                }
                let _ = done.send(());
            }
            DiskOp::DeleteAll { done } => {
                if let Err(e) = store.delete_all().await {
                    warn!(error = %e, "Failed to clear disk cache");
                    counters.write_failure();
                }
                let _ = done.send(());
            }
            DiskOp::Flush { done } => {
                let _ = done.send(());
            }
        }
    }
    debug!("Disk writer stopped");
}
