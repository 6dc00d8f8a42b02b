use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use crate::sidecars::terminate_sidecars;

pub(crate) async fn run(grace_secs: u64, names: Vec<String>) -> Result<i32> {
    match terminate_sidecars(&names, Duration::from_secs(grace_secs)).await {
        Ok(count) => {
            info!("terminated {count} sidecar process(es)");
            Ok(0)
        }
        Err(err) => {
            error!("{err:#}");
            Ok(1)
        }
    }
}
