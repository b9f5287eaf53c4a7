//! In-process store client.
//!
//! Keeps the whole database as one JSON tree and reproduces the store's write
//! semantics: `create` replaces, `update` merges object fields, writing `null`
//! or deleting prunes the node and any parents left empty. Listeners receive
//! child events for their node after every write that touches it.

use super::tree::{diff_children, lookup, prune, set};
use super::{ChildEventListener, NodePath, NodeValue, RemoteStoreClient};
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::trace;

type Registered = (NodePath, Arc<dyn ChildEventListener>);

/// Store client backed by process memory.
pub struct InMemoryStoreClient {
    root: RwLock<Value>,
    listeners: Mutex<Vec<Registered>>,
}

impl InMemoryStoreClient {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Copy of the full database, for assertions.
    pub fn snapshot(&self) -> Value {
        self.root.read().clone()
    }

    /// Whether nothing at all is stored.
    pub fn is_empty(&self) -> bool {
        match &*self.root.read() {
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    fn write<F>(&self, path: &NodePath, mutate: F)
    where
        F: FnOnce(&mut Value),
    {
        let watchers: Vec<Registered> = self
            .listeners
            .lock()
            .iter()
            .filter(|(watched, _)| related(watched, path))
            .cloned()
            .collect();

        let events = {
            let mut root = self.root.write();
            let before: Vec<Option<Value>> = watchers
                .iter()
                .map(|(watched, _)| lookup(&root, watched).cloned())
                .collect();
            mutate(&mut *root);
            prune(&mut *root);
            watchers
                .iter()
                .zip(before)
                .map(|((watched, listener), before)| {
                    let after = lookup(&root, watched);
                    (Arc::clone(listener), diff_children(before.as_ref(), after))
                })
                .collect::<Vec<_>>()
        };

        for (listener, changes) in events {
            for event in changes {
                listener.on_child_event(event);
            }
        }
    }
}

impl Default for InMemoryStoreClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStoreClient for InMemoryStoreClient {
    async fn fetch_node(&self, path: &NodePath) -> Result<Option<NodeValue>, StoreError> {
        let root = self.root.read();
        Ok(lookup(&root, path)
            .filter(|v| !v.is_null())
            .cloned()
            .map(NodeValue::from_json))
    }

    async fn subscribe_to(
        &self,
        path: &NodePath,
        listener: Arc<dyn ChildEventListener>,
    ) -> Result<(), StoreError> {
        let existing = {
            let root = self.root.read();
            self.listeners
                .lock()
                .push((path.clone(), Arc::clone(&listener)));
            diff_children(None, lookup(&root, path))
        };
        for event in existing {
            listener.on_child_event(event);
        }
        Ok(())
    }

    async fn create(&self, path: &NodePath, value: NodeValue) -> Result<(), StoreError> {
        trace!(path = %path, "create");
        let value = value.into_json();
        self.write(path, |root| set(root, path, value));
        Ok(())
    }

    async fn update(&self, path: &NodePath, value: NodeValue) -> Result<(), StoreError> {
        trace!(path = %path, "update");
        let value = value.into_json();
        self.write(path, |root| {
            let merged = match (lookup(root, path), value) {
                (Some(Value::Object(existing)), Value::Object(patch)) => {
                    let mut existing = existing.clone();
                    for (key, field) in patch {
                        existing.insert(key, field);
                    }
                    Value::Object(existing)
                }
                (_, value) => value,
            };
            set(root, path, merged);
        });
        Ok(())
    }

    async fn delete(&self, path: &NodePath) -> Result<(), StoreError> {
        trace!(path = %path, "delete");
        self.write(path, |root| set(root, path, Value::Null));
        Ok(())
    }
}

fn related(watched: &NodePath, written: &NodePath) -> bool {
    watched == written || watched.is_ancestor_of(written) || written.is_ancestor_of(watched)
}
