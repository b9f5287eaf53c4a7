//! Integration tests for firebridge

mod domain_flow;
mod support;
mod tidy_client;
mod web_routes;
