use std::time::Duration;

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, Signal as SignalStream, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Relays termination-class signals received by the supervisor to the
/// managed process, after an optional grace delay.
///
/// Listeners are installed by [`SignalForwarder::arm`], which replaces the
/// default disposition of each signal, so it must run before the managed
/// process is spawned.
pub struct SignalForwarder {
    listeners: Vec<(Signal, SignalStream)>,
    delay: Duration,
}

impl SignalForwarder {
    pub fn arm(signals: &[Signal], delay: Duration) -> Result<Self> {
        let mut listeners = Vec::with_capacity(signals.len());
        for sig in signals {
            let stream = signal(SignalKind::from_raw(*sig as i32))
                .with_context(|| format!("failed to listen for {sig}"))?;
            listeners.push((*sig, stream));
        }
        Ok(Self { listeners, delay })
    }

    /// Starts one listener task per signal kind and a single relay task.
    pub fn spawn(self, target: Pid) -> JoinHandle<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        for (sig, mut stream) in self.listeners {
            let tx = tx.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    if tx.send(sig).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        tokio::spawn(relay(rx, target, self.delay))
    }
}

async fn relay(mut received: mpsc::UnboundedReceiver<Signal>, target: Pid, delay: Duration) {
    while let Some(sig) = received.recv().await {
        if delay.is_zero() {
            info!("received {sig}; forwarding to pid {target}");
        } else {
            info!(
                "received {sig}; forwarding to pid {target} in {}s",
                delay.as_secs()
            );
            sleep(delay).await;
        }
        send_signal(target, sig);
    }
    debug!("signal relay for pid {target} stopped");
}

/// Sends `sig` to `target`; returns whether delivery succeeded.
pub fn send_signal(target: Pid, sig: Signal) -> bool {
    match kill(target, sig) {
        Ok(()) => true,
        Err(Errno::ESRCH) => {
            debug!("pid {target} is already gone; dropped {sig}");
            false
        }
        Err(err) => {
            warn!("failed to send {sig} to pid {target}: {err}");
            false
        }
    }
}
