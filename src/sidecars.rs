use std::ffi::OsStr;
use std::time::Duration;

use anyhow::{bail, Result};
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use sysinfo::{Process, ProcessesToUpdate, System};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::signals::send_signal;

/// Sends SIGTERM to every process whose executable name is in `names`,
/// after waiting `grace`.
pub async fn terminate_sidecars(names: &[String], grace: Duration) -> Result<usize> {
    if names.is_empty() {
        debug!("no sidecars to terminate");
        return Ok(0);
    }

    if !grace.is_zero() {
        info!("waiting {}s before terminating sidecars", grace.as_secs());
        sleep(grace).await;
    }

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let own_pid = std::process::id();
    let mut targets: Vec<u32> = system
        .processes()
        .iter()
        .filter(|(pid, process)| pid.as_u32() != own_pid && matches_any(process, names))
        .map(|(pid, _)| pid.as_u32())
        .collect();
    targets.sort_unstable();

    for pid in &targets {
        info!("sending SIGTERM to sidecar pid {pid}");
        if !send_signal(Pid::from_raw(*pid as i32), Signal::SIGTERM) {
            bail!("failed to terminate sidecar pid {pid}");
        }
    }

    if targets.is_empty() {
        debug!("no running process matched {names:?}");
    }
    Ok(targets.len())
}

fn matches_any(process: &Process, names: &[String]) -> bool {
    let exe_name = process.exe().and_then(|exe| exe.file_name());
    names.iter().any(|name| {
        let name = OsStr::new(name);
        process.name() == name || exe_name == Some(name)
    })
}
