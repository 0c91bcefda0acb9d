//! Main collector that combines the procfs, DMI and allocator readers.
//!
//! The `Collector` struct provides a unified interface for assembling a
//! `SystemSnapshot` and for the on-demand lookups (CPU topology, firmware
//! identity, port owners).

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::collector::dmi::{DEFAULT_DMI_PATH, DmiCollector};
use crate::collector::procfs::{PortResolver, SocketRecord, SystemCollector, logical_cpus};
use crate::collector::traits::FileSystem;
use crate::model::{BiosInfo, BoardInfo, CpuTopology, SystemSnapshot, UsageTriple};
use crate::runtime::runtime_stats;

/// Timing information for each snapshot phase.
///
/// Used for debugging and performance monitoring.
#[derive(Debug, Clone, Default)]
pub struct CollectorTiming {
    /// Total snapshot collection time.
    pub total: Duration,
    /// Time to read allocator statistics.
    pub runtime: Duration,
    /// Time to read `/proc/stat`.
    pub cpu: Duration,
    /// Time to query filesystem usage.
    pub disk: Duration,
    /// Time to read `/proc/meminfo`.
    pub memory: Duration,
    /// Time to read host name, uptime and thread count.
    pub process: Duration,
}

/// Main collector that gathers host facts.
pub struct Collector<F: FileSystem + Clone> {
    fs: F,
    system_collector: SystemCollector<F>,
    port_resolver: PortResolver<F>,
    dmi_collector: DmiCollector<F>,
    disk_path: PathBuf,
    /// Timing information from the last collect_snapshot call.
    last_timing: Option<CollectorTiming>,
}

impl<F: FileSystem + Clone> Collector<F> {
    /// Filesystem whose usage is reported unless overridden.
    const DEFAULT_DISK_PATH: &'static str = "/";

    /// Creates a new collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    ///
    /// DMI identity is read from `/sys/class/dmi/id` and disk usage is
    /// reported for `/` until overridden.
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        let proc_path = proc_path.into();

        Self {
            fs: fs.clone(),
            system_collector: SystemCollector::new(fs.clone(), &proc_path),
            port_resolver: PortResolver::new(fs.clone(), &proc_path),
            dmi_collector: DmiCollector::new(fs, DEFAULT_DMI_PATH),
            disk_path: PathBuf::from(Self::DEFAULT_DISK_PATH),
            last_timing: None,
        }
    }

    /// Reads DMI identity files from `dmi_path` instead of the default.
    pub fn with_dmi_path(mut self, dmi_path: impl Into<String>) -> Self {
        self.dmi_collector = DmiCollector::new(self.fs.clone(), dmi_path);
        self
    }

    /// Reports usage of the filesystem mounted at `disk_path`.
    pub fn with_disk_path(mut self, disk_path: impl AsRef<Path>) -> Self {
        self.disk_path = disk_path.as_ref().to_path_buf();
        self
    }

    pub fn disk_path(&self) -> &Path {
        &self.disk_path
    }

    /// Returns timing information from the last collect_snapshot call.
    pub fn last_timing(&self) -> Option<&CollectorTiming> {
        self.last_timing.as_ref()
    }

    /// Returns the port resolver for socket and descriptor lookups.
    pub fn port_resolver(&self) -> &PortResolver<F> {
        &self.port_resolver
    }

    /// Collects a host load snapshot.
    ///
    /// This gathers:
    /// - Allocator statistics of this process
    /// - CPU user/idle ratios since boot
    /// - Disk usage of the configured mount
    /// - Memory usage
    /// - Host name, OS, process uptime and thread count
    ///
    /// CPU topology is not part of the snapshot; it is a separate lookup
    /// through [`Collector::cpu_topology`].
    ///
    /// Never fails: every source that cannot be read leaves its fields at
    /// zero/empty and is logged. Also records timing information accessible
    /// via `last_timing()`.
    pub fn collect_snapshot(&mut self) -> SystemSnapshot {
        let total_start = Instant::now();
        let mut timing = CollectorTiming::default();

        let start = Instant::now();
        let runtime = runtime_stats();
        timing.runtime = start.elapsed();

        let start = Instant::now();
        let (cpu_user, cpu_free) = match self.system_collector.collect_cpu_ticks() {
            Ok(ticks) => ticks.ratios(),
            Err(e) => {
                warn!("Failed to read cpu ticks: {}", e);
                (0.0, 0.0)
            }
        };
        timing.cpu = start.elapsed();

        let start = Instant::now();
        let disk = self.collect_disk_usage();
        timing.disk = start.elapsed();

        let start = Instant::now();
        let memory = self.system_collector.collect_meminfo().unwrap_or_else(|e| {
            warn!("Failed to read meminfo: {}", e);
            UsageTriple::default()
        });
        timing.memory = start.elapsed();

        let start = Instant::now();
        let server_name = self.collect_hostname();
        let run_time = match self.system_collector.collect_process_uptime() {
            Ok(uptime) => uptime.as_nanos() as u64,
            Err(e) => {
                debug!("Failed to read process uptime: {}", e);
                0
            }
        };
        let task_num = self
            .system_collector
            .collect_thread_count()
            .unwrap_or_else(|e| {
                debug!("Failed to read thread count: {}", e);
                0
            });
        timing.process = start.elapsed();

        timing.total = total_start.elapsed();
        debug!(
            "snapshot collected in {:?} (runtime {:?}, cpu {:?}, disk {:?}, memory {:?}, process {:?})",
            timing.total, timing.runtime, timing.cpu, timing.disk, timing.memory, timing.process
        );
        self.last_timing = Some(timing);

        SystemSnapshot {
            captured_at: Utc::now(),
            server_name,
            system_os: std::env::consts::OS.to_string(),
            run_time,
            task_num,
            cpu_num: logical_cpus(),
            cpu_user,
            cpu_free,
            disk_used: disk.used,
            disk_free: disk.free,
            disk_total: disk.total,
            mem_used: memory.used,
            mem_free: memory.free,
            mem_total: memory.total,
            runtime,
        }
    }

    fn collect_disk_usage(&self) -> UsageTriple {
        match self.fs.statvfs(&self.disk_path) {
            Ok(usage) => UsageTriple::from_total_free(usage.total, usage.free),
            Err(e) => {
                warn!(
                    "Failed to query filesystem usage of {}: {}",
                    self.disk_path.display(),
                    e
                );
                UsageTriple::default()
            }
        }
    }

    fn collect_hostname(&self) -> String {
        match self.system_collector.collect_hostname() {
            Ok(name) => name,
            Err(e) => {
                debug!("Kernel hostname unavailable ({}), asking the OS", e);
                system_hostname().unwrap_or_else(|| {
                    warn!("Failed to determine host name");
                    String::new()
                })
            }
        }
    }

    /// Reads the CPU topology. Never fails (see
    /// [`SystemCollector::collect_cpu_topology`]).
    pub fn cpu_topology(&self) -> CpuTopology {
        self.system_collector.collect_cpu_topology()
    }

    pub fn bios(&self) -> BiosInfo {
        self.dmi_collector.bios()
    }

    pub fn board(&self) -> BoardInfo {
        self.dmi_collector.board()
    }

    /// See [`PortResolver::pid_by_port`].
    pub fn pid_by_port(&self, port: u16) -> Option<u32> {
        self.port_resolver.pid_by_port(port)
    }

    /// See [`PortResolver::listeners`].
    pub fn listeners(&self) -> Vec<(SocketRecord, Option<u32>)> {
        self.port_resolver.listeners()
    }

    pub fn process_exists(&self, pid: u32) -> bool {
        self.port_resolver.descriptors().process_exists(pid)
    }

    pub fn exec_path(&self, pid: u32) -> Option<PathBuf> {
        self.port_resolver.descriptors().exec_path(pid)
    }
}

#[cfg(unix)]
fn system_hostname() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_collect_snapshot() {
        let mut collector = Collector::new(MockFs::typical_host(), "/proc");

        let snapshot = collector.collect_snapshot();

        assert_eq!(snapshot.server_name, "db-primary");
        assert_eq!(snapshot.system_os, std::env::consts::OS);
        assert_eq!(snapshot.run_time, 345_500_000_000);
        assert_eq!(snapshot.task_num, 3);
        assert_eq!(snapshot.cpu_num, logical_cpus());

        assert!((snapshot.cpu_user - 10000.0 / 94800.0).abs() < 1e-12);
        assert!((snapshot.cpu_free - 80000.0 / 94800.0).abs() < 1e-12);
        assert!(snapshot.cpu_user + snapshot.cpu_free <= 1.0);

        assert_eq!(snapshot.disk_total, 100_000_000_000);
        assert_eq!(snapshot.disk_free, 40_000_000_000);
        assert_eq!(snapshot.disk_used, 60_000_000_000);

        assert_eq!(snapshot.mem_total, 16384000 * 1024);
        assert_eq!(snapshot.mem_free, 8192000 * 1024);
        assert_eq!(snapshot.mem_used, 8192000 * 1024);

        assert!(collector.last_timing().is_some());
    }

    #[test]
    fn test_collect_snapshot_empty_host() {
        let mut collector = Collector::new(MockFs::new(), "/proc");

        let snapshot = collector.collect_snapshot();

        assert_eq!(snapshot.cpu_user, 0.0);
        assert_eq!(snapshot.cpu_free, 0.0);
        assert_eq!(snapshot.disk(), UsageTriple::default());
        assert_eq!(snapshot.memory(), UsageTriple::default());
        assert_eq!(snapshot.run_time, 0);
        assert_eq!(snapshot.task_num, 0);
        assert_eq!(snapshot.cpu_num, logical_cpus());
    }

    #[test]
    fn test_collect_snapshot_zero_ticks() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/stat", "cpu  0 0 0 0 0 0 0 0 0 0\n");

        let snapshot = Collector::new(fs, "/proc").collect_snapshot();
        assert_eq!(snapshot.cpu_user, 0.0);
        assert_eq!(snapshot.cpu_free, 0.0);
    }

    #[test]
    fn test_collect_snapshot_huge_uptime() {
        let mut fs = MockFs::typical_host();
        fs.add_file("/proc/uptime", "1e300 0\n");

        let snapshot = Collector::new(fs, "/proc").collect_snapshot();
        assert_eq!(snapshot.run_time, 0);
        assert_eq!(snapshot.server_name, "db-primary");
    }

    #[test]
    fn test_with_disk_path() {
        let mut fs = MockFs::typical_host();
        fs.set_fs_usage("/var/lib/data", 500, 125);

        let mut collector = Collector::new(fs, "/proc").with_disk_path("/var/lib/data");
        assert_eq!(collector.disk_path(), Path::new("/var/lib/data"));

        let disk = collector.collect_snapshot().disk();
        assert_eq!(disk.total, 500);
        assert_eq!(disk.free, 125);
        assert_eq!(disk.used, 375);
    }

    #[test]
    fn test_with_dmi_path() {
        let mut fs = MockFs::new();
        fs.add_file("/firmware/bios_vendor", "coreboot\n");

        let collector = Collector::new(fs, "/proc").with_dmi_path("/firmware");
        assert_eq!(collector.bios().vendor, "coreboot");
        assert_eq!(collector.board(), BoardInfo::default());
    }

    #[test]
    fn test_lookups() {
        let collector = Collector::new(MockFs::listening_services(), "/proc");

        assert_eq!(collector.cpu_topology().cpus, 2);
        assert_eq!(collector.bios().version, "3.1a");
        assert_eq!(collector.pid_by_port(8080), Some(777));
        assert_eq!(collector.pid_by_port(22), None);
        assert_eq!(collector.pid_by_port(3306), None);

        assert!(collector.process_exists(777));
        assert!(collector.process_exists(1));
        assert!(!collector.process_exists(4040));
        assert_eq!(
            collector.exec_path(777),
            Some(PathBuf::from("/usr/local/bin/api-server"))
        );
        assert_eq!(collector.exec_path(999), None);
    }
}
