use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tokio::signal::unix::Signal as SignalStream;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::process::exit_code_from_status;

/// Reaps every exited child on each SIGCHLD for as long as the supervisor
/// lives. The wait status of `managed` is handed to `managed_exit` once.
pub async fn run(
    mut child_events: SignalStream,
    managed: Pid,
    managed_exit: oneshot::Sender<WaitStatus>,
) {
    let mut managed_exit = Some(managed_exit);

    loop {
        for status in reap_children() {
            if status.pid() != Some(managed) || exit_code_from_status(status).is_none() {
                continue;
            }
            if let Some(sender) = managed_exit.take() {
                let _ = sender.send(status);
            }
        }

        if child_events.recv().await.is_none() {
            debug!("SIGCHLD stream closed; child reaper stopping");
            return;
        }
    }
}

/// Collects every child that has already exited, without blocking.
pub fn reap_children() -> Vec<WaitStatus> {
    let mut reaped = Vec::new();

    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => {
                debug!("reaped child {:?}: {status:?}", status.pid());
                reaped.push(status);
            }
            Err(Errno::ECHILD) => break,
            Err(Errno::EINTR) => continue,
            Err(err) => {
                warn!("waitpid failed: {err}");
                break;
            }
        }
    }

    reaped
}
