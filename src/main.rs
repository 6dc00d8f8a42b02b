mod cgroup;
mod cli;
mod commands;
mod config;
mod descriptor;
mod environment;
mod errors;
mod java;
mod logging;
mod process;
mod reaper;
mod sidecars;
mod signals;
mod supervisor;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let code = commands::run(cli.command).await?;
    std::process::exit(code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout belongs to the managed process.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
