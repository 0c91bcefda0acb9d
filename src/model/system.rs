//! Point-in-time host load snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Used/free/total byte counts of a capacity-bounded resource.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct UsageTriple {
    pub used: u64,
    pub free: u64,
    pub total: u64,
}

impl UsageTriple {
    /// Builds a triple from total and free, with `used = total - free`.
    ///
    /// `free > total` only happens with inconsistent sources; `used` then
    /// saturates at zero.
    pub fn from_total_free(total: u64, free: u64) -> Self {
        Self {
            used: total.saturating_sub(free),
            free,
            total,
        }
    }
}

/// Process allocator counters.
///
/// Source: jemalloc `mallctl` statistics and the tracking global allocator.
/// All values are zero when the binary does not install
/// [`TrackingAllocator`](crate::runtime::TrackingAllocator) or the target has
/// no jemalloc.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct RuntimeStats {
    /// Bytes currently allocated by the application.
    /// Source: `stats.allocated`
    pub alloc_current: u64,

    /// Bytes allocated since process start (never decreases).
    pub alloc_total: u64,

    /// Physically resident allocator memory.
    /// Source: `stats.resident`
    pub mem_sys: u64,

    /// Number of allocation calls since process start.
    pub mallocs: u64,

    /// Number of deallocation calls since process start.
    pub frees: u64,

    /// Unix time (ns) of the last completed purge, 0 if none ran yet.
    pub last_purge_time: u64,

    /// Dirty bytes the next purge would return to the OS.
    /// Source: `stats.arenas.<all>.pdirty` * page size
    pub next_purge: u64,

    /// Cumulative time spent inside purges (ns).
    pub pause_total_ns: u64,

    /// Duration of the last purge (ns).
    pub pause_ns: u64,

    /// Number of purges run.
    pub num_purge: u64,
}

/// Host load snapshot.
///
/// An immutable value with no identity beyond its capture instant. Every
/// field is filled best-effort: a source that could not be read leaves its
/// fields at zero/empty.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SystemSnapshot {
    /// Moment the snapshot was assembled.
    pub captured_at: DateTime<Utc>,

    /// Host name.
    /// Source: `/proc/sys/kernel/hostname`, then `gethostname(2)`
    pub server_name: String,

    /// Operating system identifier (`linux`, `macos`, ...).
    pub system_os: String,

    /// Uptime of this process in nanoseconds.
    /// Source: `/proc/uptime` minus `/proc/self/stat` starttime
    pub run_time: u64,

    /// Number of threads in this process.
    /// Source: `/proc/self/status` `Threads:`
    pub task_num: u32,

    /// Logical processors available to this process.
    pub cpu_num: u32,

    /// Share of CPU time spent in user mode since boot, in `[0, 1]`.
    /// Source: `/proc/stat` aggregate `cpu` line
    pub cpu_user: f64,

    /// Share of CPU time spent idle since boot, in `[0, 1]`.
    pub cpu_free: f64,

    pub disk_used: u64,
    pub disk_free: u64,
    pub disk_total: u64,

    /// Source: `/proc/meminfo` `MemTotal - MemFree`
    pub mem_used: u64,
    pub mem_free: u64,
    pub mem_total: u64,

    #[serde(flatten)]
    pub runtime: RuntimeStats,
}

impl SystemSnapshot {
    pub fn disk(&self) -> UsageTriple {
        UsageTriple {
            used: self.disk_used,
            free: self.disk_free,
            total: self.disk_total,
        }
    }

    pub fn memory(&self) -> UsageTriple {
        UsageTriple {
            used: self.mem_used,
            free: self.mem_free,
            total: self.mem_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_usage_from_total_free() {
        let usage = UsageTriple::from_total_free(100, 40);
        assert_eq!(usage.used, 60);
        assert_eq!(usage.free, 40);
        assert_eq!(usage.total, 100);
    }

    #[test]
    fn test_usage_inconsistent_source_saturates() {
        let usage = UsageTriple::from_total_free(40, 100);
        assert_eq!(usage.used, 0);
    }

    proptest! {
        #[test]
        fn prop_used_plus_free_is_total(total in any::<u64>(), free_ratio in 0.0f64..=1.0) {
            let free = (total as f64 * free_ratio) as u64;
            let free = free.min(total);
            let usage = UsageTriple::from_total_free(total, free);
            prop_assert_eq!(usage.used + usage.free, usage.total);
        }
    }

    #[test]
    fn test_snapshot_serializes_flat_runtime_fields() {
        let snapshot = SystemSnapshot {
            captured_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            server_name: "db-1".to_string(),
            system_os: "linux".to_string(),
            run_time: 1,
            task_num: 4,
            cpu_num: 8,
            cpu_user: 0.25,
            cpu_free: 0.5,
            disk_used: 60,
            disk_free: 40,
            disk_total: 100,
            mem_used: 3,
            mem_free: 1,
            mem_total: 4,
            runtime: RuntimeStats {
                alloc_current: 1024,
                ..Default::default()
            },
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["server_name"], "db-1");
        assert_eq!(json["disk_used"], 60);
        assert_eq!(json["alloc_current"], 1024);
        assert!(json.get("runtime").is_none());
        assert_eq!(snapshot.disk(), UsageTriple::from_total_free(100, 40));
    }
}
