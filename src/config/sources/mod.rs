//! Configuration sources, lowest precedence first.

pub mod defaults;
pub mod environment;
pub mod file;
