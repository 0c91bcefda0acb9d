//! Per-process descriptor scanning: maps socket inodes back to pids.
//!
//! The kernel exposes every open descriptor as `/proc/[pid]/fd/[fd]`, a
//! symlink whose target for sockets reads `socket:[<inode>]`.

use std::path::{Path, PathBuf};

use tracing::trace;

use crate::collector::traits::FileSystem;

/// Walks `/proc/[pid]/fd/` entries.
///
/// Nothing is cached: pids and descriptors are volatile, so every lookup
/// enumerates fresh.
#[derive(Debug, Clone)]
pub struct DescriptorScanner<F: FileSystem> {
    fs: F,
    proc_path: String,
}

fn is_numeric(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

fn numeric_file_name(path: &Path) -> Option<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| is_numeric(n))
}

/// Extracts the pid segment from a `<proc>/<pid>/fd/<fd>` path.
pub fn pid_from_fd_path(path: &Path) -> Option<u32> {
    let pid_dir = path.parent()?.parent()?;
    numeric_file_name(pid_dir)?.parse().ok()
}

impl<F: FileSystem> DescriptorScanner<F> {
    /// Creates a new descriptor scanner.
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

    /// Enumerates every `<proc>/<pid>/fd/<fd>` path visible to the caller.
    ///
    /// Paths are sorted lexically, the order a `/proc/[0-9]*/fd/[0-9]*`
    /// glob would produce. Processes whose `fd` directory cannot be listed
    /// (permissions, exited meanwhile) are skipped.
    pub fn fd_paths(&self) -> Vec<PathBuf> {
        let Ok(entries) = self.fs.read_dir(Path::new(&self.proc_path)) else {
            return Vec::new();
        };

        let mut paths = Vec::new();
        for pid_dir in entries {
            if numeric_file_name(&pid_dir).is_none() {
                continue;
            }
            let fd_dir = pid_dir.join("fd");
            match self.fs.read_dir(&fd_dir) {
                Ok(fds) => paths.extend(fds.into_iter().filter(|p| numeric_file_name(p).is_some())),
                Err(e) => trace!("skipping {}: {}", fd_dir.display(), e),
            }
        }

        paths.sort();
        paths
    }

    /// Returns the pid owning the descriptor whose target embeds `[inode]`.
    ///
    /// First match in `fd_paths` order wins. If two processes share the
    /// socket (inherited across fork) the answer depends on that order and
    /// may differ between calls.
    pub fn pid_by_inode(&self, inode: &str, fd_paths: &[PathBuf]) -> Option<u32> {
        let needle = format!("[{}]", inode);

        for path in fd_paths {
            let target = match self.fs.read_link(path) {
                Ok(target) => target,
                Err(e) => {
                    trace!("skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            if target.to_string_lossy().contains(&needle)
                && let Some(pid) = pid_from_fd_path(path)
            {
                return Some(pid);
            }
        }

        None
    }

    /// Returns `true` if `<proc>/<pid>` exists.
    pub fn process_exists(&self, pid: u32) -> bool {
        self.fs
            .exists(Path::new(&format!("{}/{}", self.proc_path, pid)))
    }

    /// Returns the executable of `pid` (target of `<proc>/<pid>/exe`).
    ///
    /// `None` when the process is gone or belongs to another user.
    pub fn exec_path(&self, pid: u32) -> Option<PathBuf> {
        let exe = format!("{}/{}/exe", self.proc_path, pid);
        self.fs.read_link(Path::new(&exe)).ok()
    }
}
