//! System collector for gathering global host facts from `/proc/`.

use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::collector::procfs::parser::{
    CpuTicks, parse_cpu_ticks, parse_cpuinfo, parse_meminfo, parse_proc_starttime,
    parse_status_threads, parse_uptime,
};
use crate::collector::traits::FileSystem;
use crate::model::{CpuTopology, UsageTriple};

/// Clock ticks per second (USER_HZ). Standard value for Linux.
const CLK_TCK: u64 = 100;

/// Error type for collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error reading a source file.
    Io(std::io::Error),
    /// Parse error in a source file.
    Parse(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

/// Number of logical processors available to this process.
///
/// Obtained from the scheduler affinity, so it works even where `/proc`
/// is hidden.
pub fn logical_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

/// Collects system-wide facts from `/proc/`.
#[derive(Debug, Clone)]
pub struct SystemCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> SystemCollector<F> {
    /// Creates a new system collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    fn read(&self, name: &str) -> std::io::Result<String> {
        let path = format!("{}/{}", self.proc_path, name);
        self.fs.read_to_string(Path::new(&path))
    }

    /// Collects cumulative CPU ticks from the aggregate line of `/proc/stat`.
    pub fn collect_cpu_ticks(&self) -> Result<CpuTicks, CollectError> {
        let content = self.read("stat")?;
        parse_cpu_ticks(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Collects memory usage in bytes from `/proc/meminfo`.
    ///
    /// `used` is `MemTotal - MemFree`.
    pub fn collect_meminfo(&self) -> Result<UsageTriple, CollectError> {
        let content = self.read("meminfo")?;
        let info = parse_meminfo(&content).map_err(|e| CollectError::Parse(e.message))?;

        Ok(UsageTriple::from_total_free(
            info.mem_total.saturating_mul(1024),
            info.mem_free.saturating_mul(1024),
        ))
    }

    /// Reads the CPU topology from `/proc/cpuinfo`.
    ///
    /// Never fails: an unreadable dump yields a topology with only
    /// `threads` filled in.
    pub fn collect_cpu_topology(&self) -> CpuTopology {
        let threads = logical_cpus();
        match self.read("cpuinfo") {
            Ok(content) => parse_cpuinfo(&content, threads),
            Err(e) => {
                debug!("cpuinfo unavailable: {}", e);
                CpuTopology {
                    threads,
                    ..Default::default()
                }
            }
        }
    }

    /// Collects the kernel host name from `/proc/sys/kernel/hostname`.
    pub fn collect_hostname(&self) -> Result<String, CollectError> {
        let content = self.read("sys/kernel/hostname")?;
        let name = content.trim();
        if name.is_empty() {
            return Err(CollectError::Parse("empty hostname".to_string()));
        }
        Ok(name.to_string())
    }

    /// Collects how long the current process has been running.
    ///
    /// Formula: uptime - starttime_jiffies / CLK_TCK
    pub fn collect_process_uptime(&self) -> Result<Duration, CollectError> {
        let uptime = parse_uptime(&self.read("uptime")?)
            .map_err(|e| CollectError::Parse(e.message))?;
        let starttime = parse_proc_starttime(&self.read("self/stat")?)
            .map_err(|e| CollectError::Parse(e.message))?;

        let uptime = Duration::try_from_secs_f64(uptime.max(0.0))
            .map_err(|e| CollectError::Parse(format!("uptime out of range: {}", e)))?;
        let started = Duration::from_millis(starttime.saturating_mul(1000) / CLK_TCK);
        Ok(uptime.saturating_sub(started))
    }

    /// Collects the number of threads of the current process.
    pub fn collect_thread_count(&self) -> Result<u32, CollectError> {
        let content = self.read("self/status")?;
        parse_status_threads(&content)
            .ok_or_else(|| CollectError::Parse("missing Threads in status".to_string()))
    }
}
