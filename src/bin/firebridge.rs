//! Firebridge CLI Binary

use anyhow::Context;
use clap::Parser;
use firebridge::tooling::cli::{Cli, CliContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let context = CliContext::new(&cli).context("Failed to load configuration")?;
    context
        .init_logging()
        .context("Failed to initialize logging")?;

    let output = context.execute(&cli.command).await?;
    println!("{}", output);
    Ok(())
}
