use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

const CGROUP_ROOT: &str = "/sys/fs/cgroup";

// cgroup v1 layout, see kernel docs cgroup-v1/memory.txt and scheduler/sched-bwc.txt.
const CFS_PERIOD_US: &str = "cpu/cpu.cfs_period_us";
const CFS_QUOTA_US: &str = "cpu/cpu.cfs_quota_us";
const MEMORY_LIMIT_IN_BYTES: &str = "memory/memory.limit_in_bytes";
const MEMORY_AND_SWAP_LIMIT_IN_BYTES: &str = "memory/memory.memsw.limit_in_bytes";

const MIB: i64 = 1024 * 1024;
/// Anything above this is treated as "no real limit".
const UNBOUNDED_MEMORY_BYTES: i64 = 256 * 1024 * MIB;
const UNBOUNDED_FRACTION_MB: i64 = 1024;

/// CPU and memory ceilings read from the container's cgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CGroupLimits {
    /// `-1` when no core limit is known.
    pub max_cores_estimated: i64,
    /// Zero or negative when no memory limit is known.
    pub memory_limit_in_bytes: i64,
}

impl CGroupLimits {
    pub fn read() -> Self {
        Self::read_from(Path::new(CGROUP_ROOT))
    }

    pub fn read_from(root: &Path) -> Self {
        let period_us = read_limit(&root.join(CFS_PERIOD_US));
        let quota_us = read_limit(&root.join(CFS_QUOTA_US));
        let memory_limit = read_limit(&root.join(MEMORY_LIMIT_IN_BYTES));
        let memory_and_swap_limit = read_limit(&root.join(MEMORY_AND_SWAP_LIMIT_IN_BYTES));

        let max_cores_estimated = if period_us > 0 && quota_us > 0 {
            (period_us as f64 / quota_us as f64).ceil() as i64
        } else {
            -1
        };

        let limits = Self {
            max_cores_estimated,
            memory_limit_in_bytes: memory_limit.max(memory_and_swap_limit),
        };
        debug!(
            max_cores = limits.max_cores_estimated,
            memory_bytes = limits.memory_limit_in_bytes,
            "read cgroup limits from {}",
            root.display()
        );
        limits
    }

    pub fn unknown() -> Self {
        Self {
            max_cores_estimated: -1,
            memory_limit_in_bytes: -1,
        }
    }

    pub fn has_core_limit(&self) -> bool {
        self.max_cores_estimated > 0
    }

    pub fn has_memory_limit(&self) -> bool {
        self.memory_limit_in_bytes > 0
    }

    /// Memory limit divided by `fraction`, in MiB.
    ///
    /// Limits above 256 GiB are almost always the kernel's "unlimited" value,
    /// so a fixed 1024 MiB is returned instead of a meaningless heap size.
    pub fn memory_fraction_in_mb(&self, fraction: i64) -> i64 {
        if self.memory_limit_in_bytes > UNBOUNDED_MEMORY_BYTES {
            return UNBOUNDED_FRACTION_MB;
        }
        self.memory_limit_in_bytes / (MIB * fraction.max(1))
    }
}

fn read_limit(path: &Path) -> i64 {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("cgroup file {} does not exist", path.display());
            return -1;
        }
        Err(err) => {
            warn!("could not read {}: {err}; defaulting to -1", path.display());
            return -1;
        }
    };

    match content.trim().parse::<i64>() {
        Ok(value) => value,
        Err(err) => {
            warn!(
                "could not parse {:?} from {}: {err}; defaulting to -1",
                content.trim(),
                path.display()
            );
            -1
        }
    }
}
