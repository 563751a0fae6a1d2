//! Serialized write-through queue.
//!
//! Mutations hand finished snapshots to [`WriteQueue::schedule`] without
//! waiting. A single background task drains the queue and calls the
//! adapter one write at a time, so writes complete in the order they were
//! scheduled and the newest snapshot is always the one left in storage.
//!
//! With coalescing on, snapshots that are already superseded by a newer one
//! waiting in the queue are skipped.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::storage::{KeyValueStore, StorageError};

/// Capacity of the persistence failure side channel.
const FAILURE_CHANNEL_CAPACITY: usize = 16;

/// A write that the adapter rejected.
///
/// The in-memory cart is unaffected; the failed snapshot is not retried.
#[derive(Debug, Clone)]
pub struct PersistenceFailure {
    /// Revision of the snapshot that failed to persist.
    pub revision: u64,
    /// The adapter's error.
    pub error: Arc<StorageError>,
}

struct PendingWrite {
    revision: u64,
    payload: String,
}

enum Command {
    Write(PendingWrite),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer.
#[derive(Debug)]
pub(crate) struct WriteQueue {
    tx: mpsc::UnboundedSender<Command>,
    failures: broadcast::Sender<PersistenceFailure>,
}

impl WriteQueue {
    /// Spawn the writer task on the current Tokio runtime.
    pub(crate) fn spawn(store: Arc<dyn KeyValueStore>, key: String, coalesce: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);

        let writer = Writer {
            store,
            key,
            coalesce,
            failures: failures.clone(),
        };
        tokio::spawn(writer.run(rx));

        Self { tx, failures }
    }

    /// Queue `payload` as the persisted form of `revision`.
    pub(crate) fn schedule(&self, revision: u64, payload: String) {
        debug!(revision, bytes = payload.len(), "Scheduled cart write");
        if self
            .tx
            .send(Command::Write(PendingWrite { revision, payload }))
            .is_err()
        {
            warn!(revision, "Cart writer has stopped, write dropped");
        }
    }

    /// Wait until every write scheduled before this call has completed.
    pub(crate) async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).is_err() {
            return;
        }
        // A dropped sender means the writer exited, there is nothing left to wait for.
        let _ = wait.await;
    }

    /// Report that `revision` will never reach storage.
    pub(crate) fn report_failure(&self, revision: u64, error: StorageError) {
        publish_failure(&self.failures, revision, error);
    }

    pub(crate) fn subscribe_failures(&self) -> broadcast::Receiver<PersistenceFailure> {
        self.failures.subscribe()
    }
}

fn publish_failure(
    failures: &broadcast::Sender<PersistenceFailure>,
    revision: u64,
    error: StorageError,
) {
    // Errs only when nobody is subscribed.
    let _ = failures.send(PersistenceFailure {
        revision,
        error: Arc::new(error),
    });
}

struct Writer {
    store: Arc<dyn KeyValueStore>,
    key: String,
    coalesce: bool,
    failures: broadcast::Sender<PersistenceFailure>,
}

impl Writer {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            let mut latest = None;
            let mut waiters = Vec::new();
            Self::absorb(command, &mut latest, &mut waiters);

            if self.coalesce {
                while let Ok(command) = rx.try_recv() {
                    Self::absorb(command, &mut latest, &mut waiters);
                }
            }

            if let Some(write) = latest {
                self.persist(write).await;
            }
            for waiter in waiters {
                let _ = waiter.send(());
            }
        }
        debug!(key = %self.key, "Cart writer stopped");
    }

    fn absorb(
        command: Command,
        latest: &mut Option<PendingWrite>,
        waiters: &mut Vec<oneshot::Sender<()>>,
    ) {
        match command {
            Command::Write(write) => {
                if let Some(superseded) = latest.replace(write) {
                    debug!(revision = superseded.revision, "Skipped superseded cart write");
                }
            }
            Command::Flush(waiter) => waiters.push(waiter),
        }
    }

    async fn persist(&self, write: PendingWrite) {
        let PendingWrite { revision, payload } = write;
        match self.store.set(&self.key, payload).await {
            Ok(()) => debug!(revision, key = %self.key, "Persisted cart"),
            Err(e) => {
                error!(revision, key = %self.key, error = %e, "Failed to persist cart");
                publish_failure(&self.failures, revision, e);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_reported_failure_reaches_subscribers() {
        let queue = WriteQueue::spawn(Arc::new(MemoryStore::new()), "cart".to_string(), true);
        let mut failures = queue.subscribe_failures();

        queue.report_failure(3, StorageError::Unavailable("gone".to_string()));

        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.revision, 3);
        assert!(matches!(*failure.error, StorageError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_report_without_subscribers_is_harmless() {
        let queue = WriteQueue::spawn(Arc::new(MemoryStore::new()), "cart".to_string(), true);
        queue.report_failure(1, StorageError::Unavailable("gone".to_string()));
        queue.flush().await;
    }
}
