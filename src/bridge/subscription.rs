//! Subscription bridge.
//!
//! Each subscription owns a node `subscriptions/{id}` holding one child per
//! matching entity. Updates from the bounded context are queued on an
//! unbounded channel and written by a per-subscription task, so context
//! callbacks never wait on the store. Subscriptions that are not kept up
//! within the configured lifetime are removed by [`SubscriptionBridge::sweep_expired`].

use super::SUBSCRIPTION_ROOT;
use crate::context::{BoundedContext, EntityUpdate, Topic};
use crate::error::ApiError;
use crate::store::{NodePath, NodeValue, RemoteStoreClient};
use crate::types::SubscriptionId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Returned to the subscriber: where live state is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub path: NodePath,
}

struct Active {
    path: NodePath,
    deadline: Instant,
    writer: JoinHandle<()>,
}

pub struct SubscriptionBridge {
    context: Arc<BoundedContext>,
    store: Arc<dyn RemoteStoreClient>,
    lifetime: Duration,
    active: Mutex<HashMap<SubscriptionId, Active>>,
}

impl SubscriptionBridge {
    pub fn new(
        context: Arc<BoundedContext>,
        store: Arc<dyn RemoteStoreClient>,
        lifetime: Duration,
    ) -> Self {
        Self {
            context,
            store,
            lifetime,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live subscriptions.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Register `topic` with the context and publish its current state.
    pub async fn subscribe(&self, topic: Topic) -> Result<SubscriptionHandle, ApiError> {
        let (tx, rx) = mpsc::unbounded_channel::<EntityUpdate>();
        let id = self.context.subscribe(
            topic.clone(),
            Arc::new(move |update: EntityUpdate| {
                // Receiver gone means the subscription is being cancelled.
                let _ = tx.send(update);
            }),
        );
        let path = NodePath::new(SUBSCRIPTION_ROOT)?.child(id.as_str())?;

        if let Err(e) = self.publish_initial(&topic, &path).await {
            self.context.cancel(&id);
            return Err(e);
        }

        let writer = tokio::spawn(write_updates(
            Arc::clone(&self.store),
            path.clone(),
            rx,
        ));
        self.active.lock().insert(
            id.clone(),
            Active {
                path: path.clone(),
                deadline: Instant::now() + self.lifetime,
                writer,
            },
        );

        Ok(SubscriptionHandle { id, path })
    }

    async fn publish_initial(&self, topic: &Topic, path: &NodePath) -> Result<(), ApiError> {
        let result = self.context.query(&topic.into())?;
        if result.entities.is_empty() {
            return Ok(());
        }
        let mut node = Map::new();
        for entity in result.entities {
            // Validate the key the same way the writer will.
            path.child(&entity.id)?;
            node.insert(entity.id, entity.state);
        }
        self.store
            .create(path, NodeValue::from_json(Value::Object(node)))
            .await?;
        Ok(())
    }

    /// Push the subscription's deadline one lifetime into the future.
    pub fn keep_up(&self, id: &SubscriptionId) -> Result<(), ApiError> {
        let mut active = self.active.lock();
        let entry = active
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("Subscription {}", id)))?;
        entry.deadline = Instant::now() + self.lifetime;
        debug!(subscription = %id, "Subscription kept up");
        Ok(())
    }

    /// Unregister a subscription and delete its node.
    pub async fn cancel(&self, id: &SubscriptionId) -> Result<(), ApiError> {
        let active = self
            .active
            .lock()
            .remove(id)
            .ok_or_else(|| ApiError::NotFound(format!("Subscription {}", id)))?;

        // Dropping the context callback closes the channel; the writer drains
        // what is queued and exits.
        self.context.cancel(id);
        if let Err(e) = active.writer.await {
            warn!(subscription = %id, error = %e, "Subscription writer ended abnormally");
        }
        self.store.delete(&active.path).await?;
        Ok(())
    }

    /// Cancel every subscription whose deadline has passed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<SubscriptionId> = self
            .active
            .lock()
            .iter()
            .filter(|(_, active)| active.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        let mut swept = 0;
        for id in expired {
            match self.cancel(&id).await {
                Ok(()) => swept += 1,
                // Cancelled concurrently.
                Err(ApiError::NotFound(_)) => {}
                Err(e) => {
                    swept += 1;
                    warn!(subscription = %id, error = %e, "Failed to remove expired subscription");
                }
            }
        }
        if swept > 0 {
            info!(swept, "Expired subscriptions removed");
        }
        swept
    }

    /// Cancel all subscriptions; used on shutdown.
    pub async fn cancel_all(&self) {
        let ids: Vec<SubscriptionId> = self.active.lock().keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.cancel(&id).await {
                warn!(subscription = %id, error = %e, "Failed to cancel subscription");
            }
        }
    }
}

async fn write_updates(
    store: Arc<dyn RemoteStoreClient>,
    path: NodePath,
    mut rx: mpsc::UnboundedReceiver<EntityUpdate>,
) {
    while let Some(update) = rx.recv().await {
        let child = match path.child(&update.entity.id) {
            Ok(child) => child,
            Err(e) => {
                warn!(path = %path, entity = %update.entity.id, error = %e, "Skipping update");
                continue;
            }
        };
        if let Err(e) = store
            .create(&child, NodeValue::from_json(update.entity.state))
            .await
        {
            warn!(path = %child, error = %e, "Failed to write subscription update");
        }
    }
}
