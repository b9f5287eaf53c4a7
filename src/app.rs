//! Application assembly.
//!
//! Wires the bounded context, the store client stack and both bridges from a
//! [`HarnessConfig`]. Every store write goes through one [`TidyClient`], so
//! [`Application::shutdown`] can remove everything the run created.

use crate::bridge::{QueryBridge, SubscriptionBridge};
use crate::config::{HarnessConfig, StoreBackend};
use crate::context::BoundedContext;
use crate::error::ApiError;
use crate::store::{
    CleanupReport, InMemoryStoreClient, RemoteStoreClient, RestStoreClient, RetryingClient,
    TidyClient,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Application {
    config: HarnessConfig,
    context: Arc<BoundedContext>,
    store: Arc<TidyClient>,
    queries: QueryBridge,
    subscriptions: SubscriptionBridge,
}

impl Application {
    /// Build with the store backend named in `config`.
    pub fn build(config: HarnessConfig) -> Result<Self, ApiError> {
        let backend: Arc<dyn RemoteStoreClient> = match config.store.backend {
            StoreBackend::Memory => Arc::new(InMemoryStoreClient::new()),
            StoreBackend::Rest => {
                let url = config.store.database_url.as_deref().ok_or_else(|| {
                    ApiError::ConfigError("store.database_url is not set".to_string())
                })?;
                Arc::new(RestStoreClient::new(
                    url,
                    config.store.auth_token.clone(),
                    config.store.timeout(),
                )?)
            }
        };
        info!(backend = ?config.store.backend, "Store backend selected");
        Ok(Self::with_store(config, backend))
    }

    /// Build on top of an existing store client.
    pub fn with_store(config: HarnessConfig, backend: Arc<dyn RemoteStoreClient>) -> Self {
        let retrying: Arc<dyn RemoteStoreClient> =
            Arc::new(RetryingClient::new(backend, config.retry.clone()));
        let store = Arc::new(TidyClient::new(retrying));
        let context = Arc::new(BoundedContext::new(config.context_name.clone()));
        let queries = QueryBridge::new(Arc::clone(&context), store.clone());
        let subscriptions = SubscriptionBridge::new(
            Arc::clone(&context),
            store.clone(),
            config.subscriptions.lifetime(),
        );

        Self {
            config,
            context,
            store,
            queries,
            subscriptions,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<BoundedContext> {
        &self.context
    }

    pub fn store(&self) -> &Arc<TidyClient> {
        &self.store
    }

    pub fn queries(&self) -> &QueryBridge {
        &self.queries
    }

    pub fn subscriptions(&self) -> &SubscriptionBridge {
        &self.subscriptions
    }

    /// Cancel live subscriptions, then delete every node this run wrote.
    pub async fn shutdown(&self) -> CleanupReport {
        self.subscriptions.cancel_all().await;
        let report = self.store.teardown().await;
        if report.failed > 0 {
            warn!(
                deleted = report.deleted,
                failed = report.failed,
                "Shutdown left nodes behind"
            );
        } else {
            info!(deleted = report.deleted, "Shutdown complete");
        }
        report
    }
}
