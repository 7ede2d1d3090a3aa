//! Store module: the Local State Store and its read projections.
//!
//! The store is the only shared mutable resource. The Synchronizer is its
//! single writer; everything else (filtering, progress, rendering) reads.

mod filter;
mod progress;
mod state;

pub use filter::{StatusFilter, TaskFilter};
pub use progress::{Counts, Progress, progress_percent};
pub use state::TaskStore;

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::Task;

/// Handle to the store shared between the Synchronizer and its readers.
///
/// Design intent:
/// - Readers take a read guard; only the Synchronizer takes the write guard.
/// - No guard is held across a remote call, so the optimistic change is
///   visible while the request is in flight.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<RwLock<TaskStore>>,
}

impl SharedStore {
    pub fn new(store: TaskStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, TaskStore> {
        self.inner.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, TaskStore> {
        self.inner.write().await
    }

    /// Owned copy of the current tasks.
    pub async fn tasks(&self) -> Vec<Task> {
        self.inner.read().await.snapshot()
    }

    /// Filtered owned copy, in store order.
    pub async fn filtered(&self, filter: &TaskFilter) -> Vec<Task> {
        let store = self.inner.read().await;
        filter.apply(store.tasks()).into_iter().cloned().collect()
    }
}
