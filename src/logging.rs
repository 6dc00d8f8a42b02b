use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::signals::send_signal;

pub const DEFAULT_ROTATE_AFTER_MB: u64 = 50;
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 10_000;

/// Size-triggered rename rotation for log files written by a managed process
/// that reopens its logs on SIGUSR1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRotator {
    pub paths: Vec<PathBuf>,
    pub rotate_after_mb: u64,
    pub check_interval: Duration,
}

impl LogRotator {
    pub fn new(paths: Vec<PathBuf>, rotate_after_mb: u64, check_interval: Duration) -> Self {
        Self {
            paths,
            rotate_after_mb,
            check_interval,
        }
    }

    /// Polls until the task is dropped with the supervisor.
    pub async fn run(self, pid: Pid) {
        let mut ticker = interval(self.check_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "rotating {:?} after {} MB, checking every {:?}",
            self.paths, self.rotate_after_mb, self.check_interval
        );

        loop {
            ticker.tick().await;
            self.check_once(pid);
        }
    }

    /// One polling pass; returns how many files were rotated.
    pub fn check_once(&self, pid: Pid) -> usize {
        let mut rotated = 0;
        for path in &self.paths {
            match self.rotate_if_needed(path) {
                Ok(false) => {}
                Ok(true) => {
                    rotated += 1;
                    if send_signal(pid, Signal::SIGUSR1) {
                        debug!("asked pid {pid} to reopen {}", path.display());
                    }
                }
                Err(err) => warn!("log rotation failed: {err:#}"),
            }
        }
        rotated
    }

    fn rotate_if_needed(&self, path: &Path) -> Result<bool> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to stat {}", path.display()))
            }
        };

        let size_mb = metadata.len() >> 20;
        if size_mb < self.rotate_after_mb {
            return Ok(false);
        }

        let archived = archived_path(path);
        fs::rename(path, &archived).with_context(|| {
            format!(
                "failed to rotate {} -> {}",
                path.display(),
                archived.display()
            )
        })?;
        info!(
            "rotated {} ({size_mb} MB) to {}",
            path.display(),
            archived.display()
        );
        Ok(true)
    }
}

/// `access.log` becomes `access.1.log`; a name without extension gets `.1`.
pub fn archived_path(path: &Path) -> PathBuf {
    let Some(stem) = path.file_stem().and_then(|value| value.to_str()) else {
        return PathBuf::from(format!("{}.1", path.display()));
    };
    let name = match path.extension().and_then(|value| value.to_str()) {
        Some(extension) => format!("{stem}.1.{extension}"),
        None => format!("{stem}.1"),
    };
    path.with_file_name(name)
}
