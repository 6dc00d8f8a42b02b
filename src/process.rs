use std::fmt;
use std::fs;
use std::path::Path;

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use tracing::{error, info, warn};

/// Exit codes at or above this value encode death by signal (`128 + signo`).
pub const SIGNAL_EXIT_BASE: i32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    Java,
    Nginx,
    NodeJs,
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Workload::Java => "java",
            Workload::Nginx => "nginx",
            Workload::NodeJs => "nodejs",
        };
        write!(f, "{value}")
    }
}

impl Workload {
    /// Signals whose delivery counts as an orderly, supervisor-driven stop.
    pub fn graceful_signals(self) -> &'static [Signal] {
        match self {
            Workload::Java | Workload::NodeJs => &[Signal::SIGINT, Signal::SIGTERM],
            Workload::Nginx => &[Signal::SIGINT, Signal::SIGTERM, Signal::SIGQUIT],
        }
    }

    pub fn forwarded_signals(self) -> &'static [Signal] {
        match self {
            Workload::Java | Workload::NodeJs => {
                &[Signal::SIGINT, Signal::SIGTERM, Signal::SIGQUIT]
            }
            Workload::Nginx => &[
                Signal::SIGINT,
                Signal::SIGTERM,
                Signal::SIGQUIT,
                Signal::SIGUSR1,
            ],
        }
    }

    /// Maps the raw exit code of `pid` to the supervisor's own exit code.
    pub fn translate_exit_code(self, code: i32, pid: i32) -> i32 {
        self.translate_exit_code_in(code, pid, Path::new("."))
    }

    fn translate_exit_code_in(self, code: i32, pid: i32, crash_dir: &Path) -> i32 {
        if self == Workload::Java && code == signal_exit_code(Signal::SIGABRT) {
            error!("{self} process {pid} aborted, most likely out of memory");
            log_crash_report(&crash_dir.join(format!("hs_err_pid{pid}.log")));
            return code;
        }

        if self
            .graceful_signals()
            .iter()
            .any(|signal| code == signal_exit_code(*signal))
        {
            info!("{self} process {pid} stopped by signal (exit code {code}); exiting with 0");
            return 0;
        }

        if code != 0 {
            warn!("{self} process {pid} exited with code {code}");
        }
        code
    }
}

/// The resolved program and argument list for one managed process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub workload: Workload,
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchSpec {
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        shell_words::join(parts)
    }
}

pub fn signal_exit_code(signal: Signal) -> i32 {
    SIGNAL_EXIT_BASE + signal as i32
}

/// Raw exit code for a terminal wait status; `None` for stop/continue events.
pub fn exit_code_from_status(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(signal_exit_code(signal)),
        _ => None,
    }
}

fn log_crash_report(path: &Path) {
    match fs::read_to_string(path) {
        Ok(report) => error!("crash report {}:\n{report}", path.display()),
        Err(err) => warn!("could not read crash report {}: {err}", path.display()),
    }
}
