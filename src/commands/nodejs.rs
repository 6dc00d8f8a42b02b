use std::path::PathBuf;

use anyhow::Result;

use crate::config::SupervisorConfig;
use crate::environment::ProcessEnvironment;
use crate::process::{LaunchSpec, Workload};
use crate::supervisor::supervise;

pub(crate) async fn run(main: PathBuf) -> Result<i32> {
    let spec = LaunchSpec {
        workload: Workload::NodeJs,
        program: "node".to_string(),
        args: vec![main.display().to_string()],
    };

    supervise(spec, &SupervisorConfig::from_env(&ProcessEnvironment), None).await
}
