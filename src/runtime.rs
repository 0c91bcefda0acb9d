//! Process allocator statistics and memory purge triggers.
//!
//! The binary installs [`TrackingAllocator`] as its global allocator. It
//! forwards to jemalloc and counts allocation traffic; jemalloc's own
//! `mallctl` statistics supply current and resident sizes. A purge returns
//! dirty pages of all arenas to the OS, the closest thing this process has
//! to a forced collection.
//!
//! ```ignore
//! use hostprobe::runtime::TrackingAllocator;
//!
//! #[global_allocator]
//! static GLOBAL: TrackingAllocator = TrackingAllocator;
//! ```

use std::alloc::{GlobalAlloc, Layout};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use crate::model::RuntimeStats;

#[cfg(not(target_env = "msvc"))]
const INNER: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[cfg(target_env = "msvc")]
const INNER: std::alloc::System = std::alloc::System;

static ALLOC_BYTES_TOTAL: AtomicU64 = AtomicU64::new(0);
static ALLOC_CALLS: AtomicU64 = AtomicU64::new(0);
static FREE_CALLS: AtomicU64 = AtomicU64::new(0);

static PURGE_COUNT: AtomicU64 = AtomicU64::new(0);
static LAST_PURGE_UNIX_NS: AtomicU64 = AtomicU64::new(0);
static LAST_PURGE_PAUSE_NS: AtomicU64 = AtomicU64::new(0);
static PURGE_PAUSE_TOTAL_NS: AtomicU64 = AtomicU64::new(0);

#[inline]
fn record_alloc(size: usize) {
    ALLOC_BYTES_TOTAL.fetch_add(size as u64, Ordering::Relaxed);
    ALLOC_CALLS.fetch_add(1, Ordering::Relaxed);
}

/// Global allocator that counts allocation traffic.
///
/// Counters are process-wide; they only move when this type is the
/// `#[global_allocator]` (or is called directly).
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { INNER.alloc(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { INNER.alloc_zeroed(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { INNER.dealloc(ptr, layout) };
        FREE_CALLS.fetch_add(1, Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { INNER.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            // Counted as a fresh allocation plus a free of the old block
            record_alloc(new_size);
            FREE_CALLS.fetch_add(1, Ordering::Relaxed);
        }
        new_ptr
    }
}

#[cfg(not(target_env = "msvc"))]
mod jemalloc {
    use std::ffi::CStr;
    use std::ptr;

    /// Reads a `size_t` statistic; `None` if the name is unknown.
    fn read_usize(name: &CStr) -> Option<usize> {
        let mut value: usize = 0;
        let mut len = std::mem::size_of::<usize>();
        // SAFETY: oldp points at a usize and oldlenp holds its size, which is
        // the type jemalloc documents for every statistic read here.
        let rc = unsafe {
            tikv_jemalloc_sys::mallctl(
                name.as_ptr(),
                (&mut value as *mut usize).cast(),
                &mut len,
                ptr::null_mut(),
                0,
            )
        };
        (rc == 0).then_some(value)
    }

    /// Statistics are cached by jemalloc until the epoch is advanced.
    pub(super) fn refresh() {
        let mut epoch: u64 = 1;
        let mut len = std::mem::size_of::<u64>();
        // SAFETY: "epoch" takes and returns a uint64_t.
        unsafe {
            tikv_jemalloc_sys::mallctl(
                c"epoch".as_ptr(),
                (&mut epoch as *mut u64).cast(),
                &mut len,
                (&mut epoch as *mut u64).cast(),
                std::mem::size_of::<u64>(),
            );
        }
    }

    pub(super) fn allocated() -> u64 {
        read_usize(c"stats.allocated").unwrap_or(0) as u64
    }

    pub(super) fn resident() -> u64 {
        read_usize(c"stats.resident").unwrap_or(0) as u64
    }

    /// Dirty bytes across all arenas (MALLCTL_ARENAS_ALL = 4096).
    pub(super) fn dirty_bytes() -> u64 {
        let pages = read_usize(c"stats.arenas.4096.pdirty").unwrap_or(0) as u64;
        let page_size = read_usize(c"arenas.page").unwrap_or(0) as u64;
        pages.saturating_mul(page_size)
    }

    pub(super) fn purge_all_arenas() {
        // SAFETY: arena.<i>.purge takes no arguments.
        unsafe {
            tikv_jemalloc_sys::mallctl(
                c"arena.4096.purge".as_ptr(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                0,
            );
        }
    }
}

#[cfg(target_env = "msvc")]
mod jemalloc {
    pub(super) fn refresh() {}

    pub(super) fn allocated() -> u64 {
        0
    }

    pub(super) fn resident() -> u64 {
        0
    }

    pub(super) fn dirty_bytes() -> u64 {
        0
    }

    pub(super) fn purge_all_arenas() {}
}

/// Captures the current allocator counters.
pub fn runtime_stats() -> RuntimeStats {
    jemalloc::refresh();

    RuntimeStats {
        alloc_current: jemalloc::allocated(),
        alloc_total: ALLOC_BYTES_TOTAL.load(Ordering::Relaxed),
        mem_sys: jemalloc::resident(),
        mallocs: ALLOC_CALLS.load(Ordering::Relaxed),
        frees: FREE_CALLS.load(Ordering::Relaxed),
        last_purge_time: LAST_PURGE_UNIX_NS.load(Ordering::Relaxed),
        next_purge: jemalloc::dirty_bytes(),
        pause_total_ns: PURGE_PAUSE_TOTAL_NS.load(Ordering::Relaxed),
        pause_ns: LAST_PURGE_PAUSE_NS.load(Ordering::Relaxed),
        num_purge: PURGE_COUNT.load(Ordering::Relaxed),
    }
}

/// Returns unused allocator pages of all arenas to the OS (blocking).
pub fn force_purge() {
    let start = Instant::now();
    jemalloc::purge_all_arenas();
    let pause = start.elapsed().as_nanos() as u64;

    let now = Utc::now().timestamp_nanos_opt().unwrap_or(0).max(0) as u64;
    LAST_PURGE_UNIX_NS.store(now, Ordering::Relaxed);
    LAST_PURGE_PAUSE_NS.store(pause, Ordering::Relaxed);
    PURGE_PAUSE_TOTAL_NS.fetch_add(pause, Ordering::Relaxed);
    PURGE_COUNT.fetch_add(1, Ordering::Relaxed);

    debug!("allocator purge took {}us", pause / 1000);
}

/// Requests a purge on a detached background thread and returns at once.
///
/// There is no completion signal; a later [`runtime_stats`] call may or may
/// not observe it.
pub fn trigger_purge() {
    let spawned = std::thread::Builder::new()
        .name("hostprobe-purge".to_string())
        .spawn(force_purge);

    if let Err(e) = spawned {
        warn!("failed to spawn purge thread: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_tracking_allocator_counts_traffic() {
        let before = runtime_stats();
        let layout = Layout::from_size_align(4096, 8).unwrap();

        unsafe {
            let ptr = TrackingAllocator.alloc(layout);
            assert!(!ptr.is_null());
            let ptr = TrackingAllocator.realloc(ptr, layout, 8192);
            assert!(!ptr.is_null());
            TrackingAllocator.dealloc(ptr, Layout::from_size_align(8192, 8).unwrap());
        }

        let after = runtime_stats();
        assert!(after.alloc_total >= before.alloc_total + 4096 + 8192);
        assert!(after.mallocs >= before.mallocs + 2);
        assert!(after.frees >= before.frees + 2);
    }

    #[test]
    fn test_force_purge_records_accounting() {
        let before = runtime_stats();
        force_purge();
        let after = runtime_stats();

        assert!(after.num_purge > before.num_purge);
        assert!(after.last_purge_time > 0);
        assert!(after.pause_total_ns >= before.pause_total_ns);
    }

    #[test]
    fn test_trigger_purge_runs_in_background() {
        let before = runtime_stats().num_purge;
        trigger_purge();

        let deadline = Instant::now() + Duration::from_secs(5);
        while runtime_stats().num_purge == before && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(runtime_stats().num_purge > before);
    }
}
