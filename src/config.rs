use std::time::Duration;

use tracing::warn;

use crate::environment::Environment;

pub const SIGNAL_FORWARD_DELAY_ENV: &str = "RADISH_SIGNAL_FORWARD_DELAY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Pause between receiving a termination signal and relaying it.
    pub signal_forward_delay: Duration,
}

impl SupervisorConfig {
    pub fn from_env(env: &dyn Environment) -> Self {
        Self {
            signal_forward_delay: env_secs(env, SIGNAL_FORWARD_DELAY_ENV),
        }
    }
}

fn env_secs(env: &dyn Environment, key: &str) -> Duration {
    let Some(value) = env.lookup(key) else {
        return Duration::ZERO;
    };
    if value.trim().is_empty() {
        return Duration::ZERO;
    }

    match value.trim().parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(err) => {
            warn!("could not parse {key}={value} as whole seconds ({err}); using no delay");
            Duration::ZERO
        }
    }
}
