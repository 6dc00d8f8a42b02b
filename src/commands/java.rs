use std::path::Path;

use anyhow::Result;

use crate::cgroup::CGroupLimits;
use crate::config::SupervisorConfig;
use crate::environment::ProcessEnvironment;
use crate::java::{build_arguments, JavaVersion};
use crate::process::{LaunchSpec, Workload};
use crate::supervisor::supervise;

use super::load_descriptor;

pub(crate) async fn run(descriptor: Option<&Path>) -> Result<i32> {
    let env = ProcessEnvironment;
    let version = JavaVersion::from_env(&env)?;
    let descriptor = load_descriptor(descriptor, &env)?;
    let limits = CGroupLimits::read();

    let args = build_arguments(&descriptor, &env, version.modificators(), limits);
    let spec = LaunchSpec {
        workload: Workload::Java,
        program: "java".to_string(),
        args,
    };

    supervise(spec, &SupervisorConfig::from_env(&env), None).await
}
