//! In-memory mock filesystem for testing collectors without real `/proc`.
//!
//! This module provides `MockFs` which simulates a filesystem in memory,
//! allowing tests to run on macOS and in CI environments without Linux.

use crate::collector::traits::{FileSystem, FsUsage};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
///
/// Stores files, directories and symlinks in memory, allowing tests to
/// simulate various `/proc` filesystem states without needing actual Linux
/// access.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
    /// Map from link path to its raw target.
    links: HashMap<PathBuf, PathBuf>,
    /// Filesystem capacities keyed by mount path.
    mounts: HashMap<PathBuf, FsUsage>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    /// Adds a symbolic link pointing at `target`.
    ///
    /// The target is stored verbatim and never resolved, which is how the
    /// kernel exposes descriptor links like `socket:[12345]`.
    pub fn add_link(&mut self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.links.insert(path, target.as_ref().to_path_buf());
    }

    /// Registers the capacity of the filesystem mounted at `path`.
    pub fn set_fs_usage(&mut self, path: impl AsRef<Path>, total: u64, free: u64) {
        self.mounts
            .insert(path.as_ref().to_path_buf(), FsUsage { total, free });
    }

    /// Adds a process with a set of open descriptors.
    ///
    /// # Arguments
    /// * `pid` - Process ID
    /// * `fds` - `(fd number, link target)` pairs for `/proc/[pid]/fd/`
    pub fn add_process_fds(&mut self, pid: u32, fds: &[(u32, &str)]) {
        let fd_dir = PathBuf::from(format!("/proc/{}/fd", pid));
        self.add_dir(&fd_dir);
        for (fd, target) in fds {
            self.add_link(fd_dir.join(fd.to_string()), target);
        }
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

fn not_found(what: &str, path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not found: {:?}", what, path),
    )
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found("file", path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
            || self.directories.contains(path)
            || self.links.contains_key(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(not_found("directory", path));
        }

        // Direct children only
        let entries: HashSet<PathBuf> = self
            .files
            .keys()
            .chain(self.links.keys())
            .chain(self.directories.iter())
            .filter(|p| p.parent().is_some_and(|parent| parent == path) && *p != path)
            .cloned()
            .collect();

        Ok(entries.into_iter().collect())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        self.links.get(path).cloned().ok_or_else(|| {
            if self.exists(path) {
                io::Error::new(io::ErrorKind::InvalidInput, "not a symbolic link")
            } else {
                not_found("link", path)
            }
        })
    }

    fn statvfs(&self, path: &Path) -> io::Result<FsUsage> {
        self.mounts
            .get(path)
            .copied()
            .ok_or_else(|| not_found("mount", path))
    }
}
