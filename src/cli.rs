use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::{DEFAULT_CHECK_INTERVAL_MS, DEFAULT_ROTATE_AFTER_MB};

const BUILD_VERSION: &str = env!("RADISH_BUILD_VERSION");
const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
USAGE:
  {usage}

COMMANDS:
{subcommands}

OPTIONS:
{options}
{after-help}
";
const HELP_AFTER: &str = "\
Environment
  JAVA_VERSION_MAJOR            8, 11, 17 or 21 (java, classpath)
  RADISH_DESCRIPTOR             descriptor path when none is given
  RADISH_SIGNAL_FORWARD_DELAY   seconds to hold INT/TERM/QUIT before relaying
  RUST_LOG                      log filter, default info

Examples
  radish java /u01/app/radish.json
  radish classpath
  radish nginx --config /etc/nginx/nginx.conf --rotate-after-mb 100
  radish nodejs server.js
  radish terminate-sidecars --grace-secs 5 envoy
";

pub const DEFAULT_NGINX_LOG_FILES: &[&str] = &["/u01/logs/nginx.access", "/u01/logs/nginx.log"];

#[derive(Debug, Parser)]
#[command(
    name = "radish",
    version = BUILD_VERSION,
    about = "Container entrypoint that launches and supervises one process",
    help_template = HELP_TEMPLATE,
    after_help = HELP_AFTER
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the JVM application described by a radish descriptor.
    #[command(visible_alias = "run-java")]
    Java { descriptor: Option<PathBuf> },
    /// Print the resolved classpath of a descriptor.
    Classpath { descriptor: Option<PathBuf> },
    /// Run nginx in the foreground and rotate its logs.
    Nginx {
        #[arg(long, short = 'c')]
        config: PathBuf,
        #[arg(long = "rotate-after-mb", default_value_t = DEFAULT_ROTATE_AFTER_MB)]
        rotate_after_mb: u64,
        #[arg(long = "check-interval-ms", default_value_t = DEFAULT_CHECK_INTERVAL_MS)]
        check_interval_ms: u64,
        #[arg(long = "log-file")]
        log_files: Vec<PathBuf>,
    },
    /// Run a Node.js entry script.
    Nodejs { main: PathBuf },
    /// Send SIGTERM to running processes with the given executable names.
    TerminateSidecars {
        #[arg(long = "grace-secs", default_value_t = 0)]
        grace_secs: u64,
        names: Vec<String>,
    },
}

pub fn nginx_log_files(log_files: Vec<PathBuf>) -> Vec<PathBuf> {
    if log_files.is_empty() {
        DEFAULT_NGINX_LOG_FILES.iter().map(PathBuf::from).collect()
    } else {
        log_files
    }
}
