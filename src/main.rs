mod cli;
mod config;
mod engine;
mod model;
mod orchestrator;
mod paths;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("raise_runner=error")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();

    match cli::run(args).await {
        Ok(true) => Ok(()),
        // Failures were already reported as notices
        Ok(false) => std::process::exit(1),
        Err(e) => Err(e),
    }
}
