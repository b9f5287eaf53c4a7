//! Query bridge.

use super::QUERY_ROOT;
use crate::context::{BoundedContext, Query};
use crate::error::ApiError;
use crate::store::{NodePath, NodeValue, RemoteStoreClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Where a query result was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub path: NodePath,
    pub count: usize,
}

pub struct QueryBridge {
    context: Arc<BoundedContext>,
    store: Arc<dyn RemoteStoreClient>,
}

impl QueryBridge {
    pub fn new(context: Arc<BoundedContext>, store: Arc<dyn RemoteStoreClient>) -> Self {
        Self { context, store }
    }

    /// Run `query` and write the matching entities to a fresh node.
    pub async fn send(&self, query: &Query) -> Result<QueryResponse, ApiError> {
        let result = self.context.query(query)?;
        let path = NodePath::new(QUERY_ROOT)?.child(&Uuid::new_v4().to_string())?;
        let count = result.entities.len();

        self.store
            .create(&path, NodeValue::from_serializable(&result.entities)?)
            .await?;
        debug!(path = %path, count, target = ?query.target, "Query result written");

        Ok(QueryResponse { path, count })
    }
}
