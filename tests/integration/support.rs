//! Shared fakes and helpers.

use async_trait::async_trait;
use firebridge::store::{
    ChildEventListener, InMemoryStoreClient, NodePath, NodeValue, RemoteStoreClient,
};
use firebridge::StoreError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn path(raw: &str) -> NodePath {
    NodePath::new(raw).unwrap()
}

pub fn value(raw: serde_json::Value) -> NodeValue {
    NodeValue::from_json(raw)
}

/// In-memory store that records deletes and fails on demand.
#[derive(Default)]
pub struct RecordingClient {
    pub inner: InMemoryStoreClient,
    deletes: Mutex<Vec<NodePath>>,
    failing_writes: Mutex<HashSet<NodePath>>,
    failing_deletes: Mutex<HashSet<NodePath>>,
    failing_reads: AtomicBool,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_writes_to(&self, path: &NodePath) {
        self.failing_writes.lock().insert(path.clone());
    }

    pub fn fail_deletes_of(&self, path: &NodePath) {
        self.failing_deletes.lock().insert(path.clone());
    }

    pub fn fail_reads(&self) {
        self.failing_reads.store(true, Ordering::SeqCst);
    }

    /// Every path `delete` was called with, in call order.
    pub fn delete_calls(&self) -> Vec<NodePath> {
        self.deletes.lock().clone()
    }

    fn rejected(path: &NodePath) -> StoreError {
        StoreError::Rejected {
            path: path.clone(),
            status: 401,
            message: "Permission denied".to_string(),
        }
    }
}

#[async_trait]
impl RemoteStoreClient for RecordingClient {
    async fn fetch_node(&self, path: &NodePath) -> Result<Option<NodeValue>, StoreError> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(Self::rejected(path));
        }
        self.inner.fetch_node(path).await
    }

    async fn subscribe_to(
        &self,
        path: &NodePath,
        listener: Arc<dyn ChildEventListener>,
    ) -> Result<(), StoreError> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(Self::rejected(path));
        }
        self.inner.subscribe_to(path, listener).await
    }

    async fn create(&self, path: &NodePath, value: NodeValue) -> Result<(), StoreError> {
        if self.failing_writes.lock().contains(path) {
            return Err(Self::rejected(path));
        }
        self.inner.create(path, value).await
    }

    async fn update(&self, path: &NodePath, value: NodeValue) -> Result<(), StoreError> {
        if self.failing_writes.lock().contains(path) {
            return Err(Self::rejected(path));
        }
        self.inner.update(path, value).await
    }

    async fn delete(&self, path: &NodePath) -> Result<(), StoreError> {
        self.deletes.lock().push(path.clone());
        if self.failing_deletes.lock().contains(path) {
            return Err(Self::rejected(path));
        }
        self.inner.delete(path).await
    }
}

/// Poll `check` until it returns `Some`, failing after two seconds.
pub async fn eventually<T, F, Fut>(mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(found) = check().await {
            return found;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
