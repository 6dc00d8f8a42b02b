use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::cli::nginx_log_files;
use crate::config::SupervisorConfig;
use crate::environment::ProcessEnvironment;
use crate::logging::LogRotator;
use crate::process::{LaunchSpec, Workload};
use crate::supervisor::supervise;

pub(crate) async fn run(
    config: PathBuf,
    rotate_after_mb: u64,
    check_interval_ms: u64,
    log_files: Vec<PathBuf>,
) -> Result<i32> {
    let spec = LaunchSpec {
        workload: Workload::Nginx,
        program: "nginx".to_string(),
        args: vec![
            "-g".to_string(),
            "daemon off;".to_string(),
            "-c".to_string(),
            config.display().to_string(),
        ],
    };
    let rotator = LogRotator::new(
        nginx_log_files(log_files),
        rotate_after_mb,
        Duration::from_millis(check_interval_ms),
    );

    supervise(
        spec,
        &SupervisorConfig::from_env(&ProcessEnvironment),
        Some(rotator),
    )
    .await
}
