//! Resolves which process listens on a given port.

use std::path::PathBuf;

use tracing::debug;

use crate::collector::procfs::fd::DescriptorScanner;
use crate::collector::procfs::parser::SocketRecord;
use crate::collector::procfs::socket::SocketTableReader;
use crate::collector::traits::FileSystem;

/// Composes the socket tables and descriptor links to map a listening
/// port to its owning pid.
#[derive(Debug, Clone)]
pub struct PortResolver<F: FileSystem + Clone> {
    sockets: SocketTableReader<F>,
    descriptors: DescriptorScanner<F>,
}

impl<F: FileSystem + Clone> PortResolver<F> {
    /// Creates a new port resolver.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        let proc_path = proc_path.into();
        Self {
            sockets: SocketTableReader::new(fs.clone(), &proc_path),
            descriptors: DescriptorScanner::new(fs, proc_path),
        }
    }

    pub fn sockets(&self) -> &SocketTableReader<F> {
        &self.sockets
    }

    pub fn descriptors(&self) -> &DescriptorScanner<F> {
        &self.descriptors
    }

    /// Returns the pid listening on `port` over tcp, udp, tcp6 or udp6.
    ///
    /// Tables are scanned in that order and the first owner found wins.
    /// `None` means the information is unavailable: no listener, no `/proc`,
    /// or the owner's descriptors are hidden from this user. The result is
    /// best-effort when processes share the socket (see
    /// [`DescriptorScanner::pid_by_inode`]).
    pub fn pid_by_port(&self, port: u16) -> Option<u32> {
        // Enumerated at most once per call, on the first candidate socket
        let mut fd_paths: Option<Vec<PathBuf>> = None;

        for record in self.sockets.all_records() {
            if !record.is_listening() || record.local_port != port {
                continue;
            }

            let paths = fd_paths.get_or_insert_with(|| self.descriptors.fd_paths());
            if let Some(pid) = self.descriptors.pid_by_inode(&record.inode, paths) {
                debug!(
                    "port {} ({}) inode {} owned by pid {}",
                    port, record.protocol, record.inode, pid
                );
                return Some(pid);
            }
        }

        None
    }

    /// Returns every listening socket with its owning pid, if visible.
    pub fn listeners(&self) -> Vec<(SocketRecord, Option<u32>)> {
        let listening = self.sockets.listening();
        if listening.is_empty() {
            return Vec::new();
        }

        let fd_paths = self.descriptors.fd_paths();
        listening
            .into_iter()
            .map(|record| {
                let pid = self.descriptors.pid_by_inode(&record.inode, &fd_paths);
                (record, pid)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::collector::procfs::parser::SocketProtocol;

    const TCP_HEADER: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n";

    fn tcp_row(port: u16, state: &str, inode: u64) -> String {
        format!(
            "   0: 00000000:{:04X} 00000000:0000 {} 00000000:00000000 00:00000000 00000000  1000        0 {} 1 0000000000000000 100 0 0 10 0\n",
            port, state, inode
        )
    }

    #[test]
    fn test_pid_by_port_resolves_owner() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/proc/net/tcp",
            format!("{}{}", TCP_HEADER, tcp_row(8080, "0A", 12345)),
        );
        fs.add_process_fds(777, &[(0, "/dev/null"), (3, "socket:[12345]")]);

        let resolver = PortResolver::new(fs, "/proc");
        assert_eq!(resolver.pid_by_port(8080), Some(777));
    }

    #[test]
    fn test_pid_by_port_no_descriptor() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/proc/net/tcp",
            format!("{}{}", TCP_HEADER, tcp_row(8080, "0A", 12345)),
        );
        fs.add_process_fds(777, &[(3, "socket:[99999]")]);

        let resolver = PortResolver::new(fs, "/proc");
        assert_eq!(resolver.pid_by_port(8080), None);
    }

    #[test]
    fn test_pid_by_port_ignores_non_listening() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/proc/net/tcp",
            format!("{}{}", TCP_HEADER, tcp_row(8080, "01", 12345)),
        );
        fs.add_process_fds(777, &[(3, "socket:[12345]")]);

        let resolver = PortResolver::new(fs, "/proc");
        assert_eq!(resolver.pid_by_port(8080), None);
    }

    #[test]
    fn test_pid_by_port_without_proc() {
        let resolver = PortResolver::new(MockFs::new(), "/proc");
        assert_eq!(resolver.pid_by_port(22), None);
        assert!(resolver.listeners().is_empty());
    }

    #[test]
    fn test_pid_by_port_scans_udp_before_tcp6() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/proc/net/udp",
            format!("{}{}", TCP_HEADER, tcp_row(53, "0A", 200)),
        );
        fs.add_file(
            "/proc/net/tcp6",
            format!("{}{}", TCP_HEADER, tcp_row(53, "0A", 100)),
        );
        fs.add_process_fds(10, &[(3, "socket:[100]")]);
        fs.add_process_fds(20, &[(3, "socket:[200]")]);

        let resolver = PortResolver::new(fs, "/proc");
        assert_eq!(resolver.pid_by_port(53), Some(20));
    }

    #[test]
    fn test_pid_by_port_falls_through_to_later_table() {
        let mut fs = MockFs::new();
        // tcp listener owned by another user: descriptor not visible
        fs.add_file(
            "/proc/net/tcp",
            format!("{}{}", TCP_HEADER, tcp_row(443, "0A", 1)),
        );
        fs.add_file(
            "/proc/net/tcp6",
            format!("{}{}", TCP_HEADER, tcp_row(443, "0A", 2)),
        );
        fs.add_process_fds(30, &[(5, "socket:[2]")]);

        let resolver = PortResolver::new(fs, "/proc");
        assert_eq!(resolver.pid_by_port(443), Some(30));
    }

    #[test]
    fn test_listeners_scenario() {
        let resolver = PortResolver::new(MockFs::listening_services(), "/proc");

        let listeners = resolver.listeners();
        let http = listeners
            .iter()
            .find(|(r, _)| r.local_port == 8080 && r.protocol == SocketProtocol::Tcp)
            .unwrap();
        assert_eq!(http.1, Some(777));
        assert!(listeners.iter().all(|(r, _)| r.is_listening()));
    }
}
