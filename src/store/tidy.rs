//! Write-tracking cleanup client.
//!
//! `TidyClient` decorates another store client and remembers every path it
//! successfully creates or updates. `teardown` deletes whatever is still
//! remembered, leaving the remote namespace as it was before the run.

use super::{ChildEventListener, NodePath, NodeValue, RemoteStoreClient};
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a teardown pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failed: usize,
}

/// Store client that reverts its own writes on teardown.
pub struct TidyClient {
    delegate: Arc<dyn RemoteStoreClient>,
    written: Mutex<HashSet<NodePath>>,
    torn_down: AtomicBool,
}

impl TidyClient {
    pub fn new(delegate: Arc<dyn RemoteStoreClient>) -> Self {
        Self {
            delegate,
            written: Mutex::new(HashSet::new()),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Paths written through this client and not deleted since.
    pub fn tracked_paths(&self) -> HashSet<NodePath> {
        self.written.lock().clone()
    }

    pub fn is_tracked(&self, path: &NodePath) -> bool {
        self.written.lock().contains(path)
    }

    /// Delete every tracked path from the underlying store.
    ///
    /// Works on a snapshot of the tracked set taken up front; writes racing
    /// with teardown may be left behind. Ancestors go first, and a path already
    /// removed with its ancestor is skipped. Failures are logged and counted,
    /// never returned. Only the first call does any work.
    pub async fn teardown(&self) -> CleanupReport {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            debug!("Teardown already ran");
            return CleanupReport::default();
        }

        let mut snapshot: Vec<NodePath> = self.written.lock().iter().cloned().collect();
        snapshot.sort_by_key(|path| path.segments().count());
        info!(paths = snapshot.len(), "Cleaning up written nodes");

        let mut report = CleanupReport::default();
        for path in snapshot {
            if !self.is_tracked(&path) {
                continue;
            }
            match self.delegate.delete(&path).await {
                Ok(()) => {
                    self.untrack_subtree(&path);
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to clean up node");
                    report.failed += 1;
                }
            }
        }

        info!(
            deleted = report.deleted,
            failed = report.failed,
            "Cleanup finished"
        );
        report
    }

    /// Forget `path` and everything tracked below it.
    fn untrack_subtree(&self, path: &NodePath) {
        self.written
            .lock()
            .retain(|tracked| tracked != path && !path.is_ancestor_of(tracked));
    }
}

impl Drop for TidyClient {
    fn drop(&mut self) {
        let left = self.written.get_mut().len();
        if left > 0 && !*self.torn_down.get_mut() {
            warn!(paths = left, "Store client dropped without teardown");
        }
    }
}

#[async_trait]
impl RemoteStoreClient for TidyClient {
    async fn fetch_node(&self, path: &NodePath) -> Result<Option<NodeValue>, StoreError> {
        self.delegate.fetch_node(path).await
    }

    async fn subscribe_to(
        &self,
        path: &NodePath,
        listener: Arc<dyn ChildEventListener>,
    ) -> Result<(), StoreError> {
        self.delegate.subscribe_to(path, listener).await
    }

    async fn create(&self, path: &NodePath, value: NodeValue) -> Result<(), StoreError> {
        self.delegate.create(path, value).await?;
        self.written.lock().insert(path.clone());
        Ok(())
    }

    async fn update(&self, path: &NodePath, value: NodeValue) -> Result<(), StoreError> {
        self.delegate.update(path, value).await?;
        self.written.lock().insert(path.clone());
        Ok(())
    }

    async fn delete(&self, path: &NodePath) -> Result<(), StoreError> {
        self.delegate.delete(path).await?;
        self.untrack_subtree(path);
        Ok(())
    }
}
