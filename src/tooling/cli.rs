//! CLI Tooling
//!
//! Command-line interface of the harness: run the HTTP server or print the
//! resolved configuration.

use crate::app::Application;
use crate::config::{ConfigLoader, HarnessConfig, StoreBackend};
use crate::error::ApiError;
use crate::logging::init_logging;
use crate::web;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Firebridge - bounded-context harness over a realtime key-path store
#[derive(Parser)]
#[command(name = "firebridge")]
#[command(about = "Serve a bounded context through a realtime key-path store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server until ctrl-c, then remove every node written
    Serve {
        /// Address to listen on (overrides server.listen)
        #[arg(long)]
        listen: Option<String>,
        /// Store backend (overrides store.backend)
        #[arg(long, value_enum)]
        store: Option<StoreBackend>,
    },
    /// Print the resolved configuration as JSON
    Config,
}

/// Resolved configuration plus the command-line overrides.
pub struct CliContext {
    config: HarnessConfig,
}

impl CliContext {
    pub fn new(cli: &Cli) -> Result<Self, ApiError> {
        let mut config = ConfigLoader::load(cli.config.as_deref())?;
        if let Some(level) = &cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &cli.log_format {
            config.logging.format = format.clone();
        }
        if let Some(output) = &cli.log_output {
            config.logging.output = output.clone();
        }
        if let Some(file) = &cli.log_file {
            config.logging.file = Some(file.clone());
        }
        if let Commands::Serve { listen, store } = &cli.command {
            if let Some(listen) = listen {
                config.server.listen = listen.clone();
            }
            if let Some(store) = store {
                config.store.backend = *store;
            }
        }
        config.validate().map_err(ApiError::ConfigError)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn init_logging(&self) -> Result<(), ApiError> {
        init_logging(Some(&self.config.logging))
    }

    /// Run a command; returns text for stdout.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Serve { .. } => self.serve().await,
            Commands::Config => Ok(serde_json::to_string_pretty(&self.config)?),
        }
    }

    async fn serve(&self) -> Result<String, ApiError> {
        let app = Arc::new(Application::build(self.config.clone())?);
        let served = web::serve(Arc::clone(&app), shutdown_signal()).await;

        // Clean up even when the server failed.
        let report = app.shutdown().await;
        served?;
        Ok(format!(
            "Removed {} node(s), {} failed",
            report.deleted, report.failed
        ))
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for ctrl-c"),
    }
}
