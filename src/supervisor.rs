use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::config::SupervisorConfig;
use crate::errors::RadishError;
use crate::logging::LogRotator;
use crate::process::{exit_code_from_status, LaunchSpec};
use crate::reaper;
use crate::signals::SignalForwarder;

/// Launches the managed process and supervises it until it exits.
///
/// Returns the translated exit code the supervisor should exit with.
pub async fn supervise(
    spec: LaunchSpec,
    config: &SupervisorConfig,
    rotator: Option<LogRotator>,
) -> Result<i32> {
    become_subreaper();

    // Both listeners must exist before the child does.
    let child_events =
        signal(SignalKind::child()).context("failed to listen for SIGCHLD")?;
    let forwarder = SignalForwarder::arm(
        spec.workload.forwarded_signals(),
        config.signal_forward_delay,
    )?;

    info!("starting {}: {}", spec.workload, spec.command_line());
    let child = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| RadishError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
    let pid = Pid::from_raw(child.id() as i32);
    // The reaper owns waiting; the handle is never waited on.
    drop(child);
    info!("{} running as pid {pid}", spec.workload);

    let (exit_tx, exit_rx) = oneshot::channel();
    tokio::spawn(reaper::run(child_events, pid, exit_tx));
    forwarder.spawn(pid);
    if let Some(rotator) = rotator {
        tokio::spawn(rotator.run(pid));
    }

    let status = exit_rx
        .await
        .context("child reaper stopped before the managed process exited")?;
    let raw_code = exit_code_from_status(status).unwrap_or(1);
    info!("{} pid {pid} finished: {status:?}", spec.workload);

    Ok(spec.workload.translate_exit_code(raw_code, pid.as_raw()))
}

#[cfg(target_os = "linux")]
fn become_subreaper() {
    if let Err(err) = nix::sys::prctl::set_child_subreaper(true) {
        warn!("could not become child subreaper: {err}; orphans may not be reaped");
    }
}

#[cfg(not(target_os = "linux"))]
fn become_subreaper() {
    warn!("child subreaper is only available on Linux; relying on PID 1");
}
