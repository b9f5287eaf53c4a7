//! Remote-Store Bridges
//!
//! Deliver bounded-context results through the remote store instead of the
//! response body: query results are written under [`QUERY_ROOT`], live
//! subscription state under [`SUBSCRIPTION_ROOT`]. Callers read or subscribe
//! to the returned paths.

pub mod query;
pub mod subscription;

pub use query::{QueryBridge, QueryResponse};
pub use subscription::{SubscriptionBridge, SubscriptionHandle};

/// Parent node of written query results.
pub const QUERY_ROOT: &str = "query";

/// Parent node of live subscription state.
pub const SUBSCRIPTION_ROOT: &str = "subscriptions";
