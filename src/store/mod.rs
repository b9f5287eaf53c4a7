//! Remote Store Client
//!
//! Node paths, node values and the client interface used to reach the
//! real-time key-path store. Implementations live in the submodules; the
//! decorators (`RetryingClient`, `TidyClient`) re-expose the same interface.

pub mod memory;
pub mod path;
pub mod rest;
pub mod retry;
pub mod tidy;
mod tree;

pub use memory::InMemoryStoreClient;
pub use path::NodePath;
pub use rest::RestStoreClient;
pub use retry::RetryingClient;
pub use tidy::{CleanupReport, TidyClient};

use crate::error::StoreError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque payload stored at a node path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeValue(serde_json::Value);

impl NodeValue {
    pub fn from_json(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Serialize any value into a node payload.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, StoreError> {
        Ok(Self(serde_json::to_value(value)?))
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_json(self) -> serde_json::Value {
        self.0
    }

    /// Deserialize the payload into a typed value.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.0.clone())?)
    }
}

impl From<serde_json::Value> for NodeValue {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Change to a direct child of a subscribed node.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildEvent {
    Added { key: String, value: NodeValue },
    Changed { key: String, value: NodeValue },
    Removed { key: String },
}

impl ChildEvent {
    pub fn key(&self) -> &str {
        match self {
            ChildEvent::Added { key, .. }
            | ChildEvent::Changed { key, .. }
            | ChildEvent::Removed { key } => key,
        }
    }
}

/// Receives child events pushed by the store.
///
/// Called from whatever thread or task the store client delivers on.
pub trait ChildEventListener: Send + Sync {
    fn on_child_event(&self, event: ChildEvent);
}

impl<F> ChildEventListener for F
where
    F: Fn(ChildEvent) + Send + Sync,
{
    fn on_child_event(&self, event: ChildEvent) {
        self(event)
    }
}

/// Client interface of the remote key-path store.
#[async_trait]
pub trait RemoteStoreClient: Send + Sync {
    /// Read the value at `path`, `None` when nothing is stored there.
    async fn fetch_node(&self, path: &NodePath) -> Result<Option<NodeValue>, StoreError>;

    /// Register a listener for changes to the direct children of `path`.
    async fn subscribe_to(
        &self,
        path: &NodePath,
        listener: Arc<dyn ChildEventListener>,
    ) -> Result<(), StoreError>;

    /// Write `value` at `path`, replacing anything stored there.
    async fn create(&self, path: &NodePath, value: NodeValue) -> Result<(), StoreError>;

    /// Merge `value` into whatever is stored at `path`.
    async fn update(&self, path: &NodePath, value: NodeValue) -> Result<(), StoreError>;

    /// Remove `path` and everything below it.
    async fn delete(&self, path: &NodePath) -> Result<(), StoreError>;
}
