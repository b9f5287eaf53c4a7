//! Error types for the harness.

use crate::store::NodePath;
use thiserror::Error;

/// Errors raised by remote-store clients.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid node path: {0}")]
    InvalidPath(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Store rejected request for {path} (status {status}): {message}")]
    Rejected {
        path: NodePath,
        status: u16,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Transport(_) => true,
            StoreError::Rejected { status, .. } => *status >= 500,
            StoreError::InvalidPath(_) | StoreError::Serialization(_) => false,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

/// Errors surfaced by the domain, the bounded context and the bridges.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    /// Raised by aggregates. `BoundedContext::post` turns it into a rejected
    /// `Ack`, so routes answer 200 for it.
    #[error("Command rejected: {0}")]
    CommandRejected(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
