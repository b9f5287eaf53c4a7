//! Retrying store client decorator.

use super::{ChildEventListener, NodePath, NodeValue, RemoteStoreClient};
use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for store operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per operation, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Delay between attempts (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_attempts() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    200
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Retries retryable failures of the wrapped client.
pub struct RetryingClient {
    delegate: Arc<dyn RemoteStoreClient>,
    config: RetryConfig,
}

impl RetryingClient {
    pub fn new(delegate: Arc<dyn RemoteStoreClient>, config: RetryConfig) -> Self {
        Self { delegate, config }
    }

    async fn run<T, F, Fut>(
        &self,
        operation: &str,
        path: &NodePath,
        mut attempt: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StoreError>> + Send,
        T: Send,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut tries = 0;
        loop {
            tries += 1;
            match attempt().await {
                Ok(value) => {
                    if tries > 1 {
                        debug!(%path, operation, tries, "Store operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && tries < max_attempts => {
                    warn!(
                        %path,
                        operation,
                        tries,
                        error = %err,
                        "Store operation failed, retrying"
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl RemoteStoreClient for RetryingClient {
    async fn fetch_node(&self, path: &NodePath) -> Result<Option<NodeValue>, StoreError> {
        self.run("fetch", path, || self.delegate.fetch_node(path)).await
    }

    async fn subscribe_to(
        &self,
        path: &NodePath,
        listener: Arc<dyn ChildEventListener>,
    ) -> Result<(), StoreError> {
        self.run("subscribe", path, || {
            self.delegate.subscribe_to(path, Arc::clone(&listener))
        })
        .await
    }

    async fn create(&self, path: &NodePath, value: NodeValue) -> Result<(), StoreError> {
        self.run("create", path, || self.delegate.create(path, value.clone()))
            .await
    }

    async fn update(&self, path: &NodePath, value: NodeValue) -> Result<(), StoreError> {
        self.run("update", path, || self.delegate.update(path, value.clone()))
            .await
    }

    async fn delete(&self, path: &NodePath) -> Result<(), StoreError> {
        self.run("delete", path, || self.delegate.delete(path)).await
    }
}
