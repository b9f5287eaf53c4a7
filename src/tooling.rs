//! Tooling
//!
//! Command-line entry points.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
