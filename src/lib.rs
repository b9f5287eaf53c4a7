//! Firebridge
//!
//! Harness that hosts a bounded context behind HTTP and mirrors query results
//! and live subscriptions into a realtime key-path store. Every node written
//! during a run is tracked by [`store::TidyClient`] and removed again on
//! shutdown.

pub mod app;
pub mod bridge;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod logging;
pub mod store;
pub mod tooling;
pub mod types;
pub mod web;

pub use app::Application;
pub use error::{ApiError, StoreError};
