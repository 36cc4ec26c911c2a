//! Registry of live operations.
//!
//! The registry is the only shared mutable state in the core. Each entry
//! pairs an operation's handle with the one-shot signal that cancels it.
//! The supervisor task of an operation inserts its entry on spawn and
//! removes it after the worker has been reaped.

use crate::state::operation::OperationHandle;
use ace_protocol::operation_models::OperationSnapshot;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

/// Handle shared between the registry and the operation's supervisor task.
pub type SharedHandle = Arc<Mutex<OperationHandle>>;

struct LiveOperation {
    handle: SharedHandle,
    /// Taken by the first cancel request.
    cancel: Option<oneshot::Sender<()>>,
}

/// Thread-safe map of live operations, indexed by id.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    operations: Arc<Mutex<HashMap<Uuid, LiveOperation>>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: Uuid, handle: SharedHandle, cancel: oneshot::Sender<()>) {
        let mut operations = self.operations.lock().await;
        operations.insert(
            id,
            LiveOperation {
                handle,
                cancel: Some(cancel),
            },
        );
    }

    /// Drop the entry for `id`. Returns false if there was none.
    pub async fn remove(&self, id: Uuid) -> bool {
        let mut operations = self.operations.lock().await;
        operations.remove(&id).is_some()
    }

    /// Request forced termination of `id`.
    ///
    /// Returns false without effect when the operation is unknown, already
    /// terminal, or was already cancelled.
    pub async fn cancel(&self, id: Uuid) -> bool {
        let mut operations = self.operations.lock().await;
        let Some(live) = operations.get_mut(&id) else {
            return false;
        };

        if live.handle.lock().await.is_terminal() {
            return false;
        }

        match live.cancel.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<OperationSnapshot> {
        let handle = {
            let operations = self.operations.lock().await;
            operations.get(&id).map(|live| Arc::clone(&live.handle))
        }?;
        let snapshot = handle.lock().await.snapshot();
        Some(snapshot)
    }

    /// Snapshots of every live operation, oldest first.
    pub async fn snapshots(&self) -> Vec<OperationSnapshot> {
        let handles: Vec<SharedHandle> = {
            let operations = self.operations.lock().await;
            operations.values().map(|live| Arc::clone(&live.handle)).collect()
        };

        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            snapshots.push(handle.lock().await.snapshot());
        }
        snapshots.sort_by_key(|s| s.started_at);
        snapshots
    }

    pub async fn len(&self) -> usize {
        self.operations.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
