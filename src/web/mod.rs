//! HTTP Adapters
//!
//! `axum` routes in front of the bounded context and the bridges. Request
//! bodies are decoded through [`codec::MessageFormat`] so malformed input is
//! always reported as a `400` with an [`error::ErrorBody`].

pub mod codec;
pub mod error;
mod handlers;

pub use codec::{MessageFormat, REVERSED_JSON};
pub use error::{ApiResult, ErrorBody};

use crate::app::Application;
use crate::error::ApiError;
use axum::routing::post;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Build the router over a shared application.
pub fn router(app: Arc<Application>) -> Router {
    Router::new()
        .route("/command", post(handlers::post_command))
        .route("/reverse-json-command", post(handlers::post_reversed_command))
        .route("/query", post(handlers::post_query))
        .route("/subscription/create", post(handlers::create_subscription))
        .route("/subscription/keep-up", post(handlers::keep_up_subscription))
        .route("/subscription/cancel", post(handlers::cancel_subscription))
        .with_state(app)
}

/// Serve until `shutdown` resolves, sweeping expired subscriptions meanwhile.
///
/// Does not tear the application down; the caller runs
/// [`Application::shutdown`] once this returns.
pub async fn serve<F>(app: Arc<Application>, shutdown: F) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = app.config().server.listen.parse().map_err(|e| {
        ApiError::ConfigError(format!(
            "Invalid listen address {}: {}",
            app.config().server.listen,
            e
        ))
    })?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::ConfigError(format!("Failed to bind {}: {}", addr, e)))?;
    info!(addr = %addr, context = app.context().name(), "Listening");

    let (stop_tx, stop_rx) = watch::channel(false);
    let sweeper = tokio::spawn(sweep_loop(
        Arc::clone(&app),
        app.config().subscriptions.sweep_interval(),
        stop_rx,
    ));

    let result = axum::serve(listener, router(Arc::clone(&app)))
        .with_graceful_shutdown(shutdown)
        .await;

    let _ = stop_tx.send(true);
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Subscription sweeper ended abnormally");
    }
    result.map_err(|e| ApiError::ConfigError(format!("Server error: {}", e)))
}

async fn sweep_loop(app: Arc<Application>, every: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                app.subscriptions().sweep_expired().await;
            }
            _ = stop.changed() => break,
        }
    }
}
