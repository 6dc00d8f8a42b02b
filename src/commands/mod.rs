mod classpath;
mod java;
mod nginx;
mod nodejs;
mod sidecars;

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::Commands;
use crate::descriptor::{self, Descriptor};
use crate::environment::Environment;

/// Runs one subcommand and returns the process exit code.
pub async fn run(command: Commands) -> Result<i32> {
    match command {
        Commands::Java { descriptor } => java::run(descriptor.as_deref()).await,
        Commands::Classpath { descriptor } => classpath::run(descriptor.as_deref()),
        Commands::Nginx {
            config,
            rotate_after_mb,
            check_interval_ms,
            log_files,
        } => nginx::run(config, rotate_after_mb, check_interval_ms, log_files).await,
        Commands::Nodejs { main } => nodejs::run(main).await,
        Commands::TerminateSidecars { grace_secs, names } => {
            sidecars::run(grace_secs, names).await
        }
    }
}

pub(crate) fn load_descriptor(explicit: Option<&Path>, env: &dyn Environment) -> Result<Descriptor> {
    let path = descriptor::locate(explicit, env)?;
    info!("using descriptor {}", path.display());
    let loaded = Descriptor::load(&path)?;
    if loaded.data.main_class.trim().is_empty() {
        warn!("descriptor {} has no MainClass", path.display());
    }
    Ok(loaded)
}
