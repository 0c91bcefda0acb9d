//! Reader for the kernel socket tables `/proc/net/{tcp,udp,tcp6,udp6}`.

use std::path::PathBuf;

use tracing::debug;

use crate::collector::procfs::parser::{SocketProtocol, SocketRecord, parse_socket_line};
use crate::collector::traits::FileSystem;

/// Reads socket tables from `/proc/net/`.
///
/// Every call re-reads the table from scratch; nothing is cached because
/// sockets come and go between calls.
#[derive(Debug, Clone)]
pub struct SocketTableReader<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> SocketTableReader<F> {
    /// Creates a new socket table reader.
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

    /// Path of the table for `protocol`.
    pub fn table_path(&self, protocol: SocketProtocol) -> PathBuf {
        PathBuf::from(format!("{}/net/{}", self.proc_path, protocol.table_name()))
    }

    /// Returns the records of one table, parsed lazily line by line.
    ///
    /// A missing or unreadable table yields an empty sequence: a sandboxed
    /// caller sees fewer sockets, not an error.
    pub fn records(&self, protocol: SocketProtocol) -> SocketRecords {
        let path = self.table_path(protocol);
        let content = match self.fs.read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!("socket table {} unavailable: {}", path.display(), e);
                String::new()
            }
        };
        SocketRecords::new(content, protocol)
    }

    /// Returns the records of all four tables in resolver order
    /// (tcp, udp, tcp6, udp6).
    pub fn all_records(&self) -> impl Iterator<Item = SocketRecord> + '_ {
        SocketProtocol::ALL
            .into_iter()
            .flat_map(move |protocol| self.records(protocol))
    }

    /// Returns every socket in the listening state.
    pub fn listening(&self) -> Vec<SocketRecord> {
        self.all_records().filter(|r| r.is_listening()).collect()
    }
}

/// Lazy iterator over the rows of one socket table.
///
/// Malformed rows (and the header) are skipped.
#[derive(Debug, Clone)]
pub struct SocketRecords {
    content: String,
    pos: usize,
    protocol: SocketProtocol,
}

impl SocketRecords {
    pub fn new(content: String, protocol: SocketProtocol) -> Self {
        Self {
            content,
            pos: 0,
            protocol,
        }
    }
}

impl Iterator for SocketRecords {
    type Item = SocketRecord;

    fn next(&mut self) -> Option<SocketRecord> {
        while self.pos < self.content.len() {
            let rest = &self.content[self.pos..];
            let (line, advance) = match rest.find('\n') {
                Some(idx) => (&rest[..idx], idx + 1),
                None => (rest, rest.len()),
            };
            self.pos += advance;

            if let Some(record) = parse_socket_line(line, self.protocol) {
                return Some(record);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_records_skip_header_and_malformed_rows() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/proc/net/tcp",
            "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 12345 1 0000000000000000 100 0 0 10 0
   1: garbage
   2: 0100007F:0CEA 0100007F:D3C2 01 00000000:00000000 00:00000000 00000000  1000        0 67890 1 0000000000000000 20 4 30 10 -1",
        );

        let reader = SocketTableReader::new(fs, "/proc");
        let records: Vec<_> = reader.records(SocketProtocol::Tcp).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].local_port, 8080);
        assert_eq!(records[0].inode, "12345");
        assert_eq!(records[1].local_port, 3306);
    }

    #[test]
    fn test_records_missing_table_is_empty() {
        let reader = SocketTableReader::new(MockFs::new(), "/proc");
        assert_eq!(reader.records(SocketProtocol::Udp6).count(), 0);
        assert_eq!(reader.all_records().count(), 0);
    }

    #[test]
    fn test_records_are_restartable() {
        let fs = MockFs::listening_services();
        let reader = SocketTableReader::new(fs, "/proc");

        let first: Vec<_> = reader.all_records().collect();
        let second: Vec<_> = reader.all_records().collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_all_records_in_table_order() {
        let fs = MockFs::listening_services();
        let reader = SocketTableReader::new(fs, "/proc");

        let protocols: Vec<_> = reader.all_records().map(|r| r.protocol).collect();
        let mut sorted = protocols.clone();
        sorted.sort_by_key(|p| SocketProtocol::ALL.iter().position(|x| x == p));
        assert_eq!(protocols, sorted);
    }

    #[test]
    fn test_listening_filters_state() {
        let fs = MockFs::listening_services();
        let reader = SocketTableReader::new(fs, "/proc");

        let listening = reader.listening();
        assert!(listening.iter().all(|r| r.is_listening()));
        assert!(listening.iter().any(|r| r.local_port == 8080));
        assert!(!listening.iter().any(|r| r.local_port == 3306));
    }

    #[test]
    fn test_table_path_uses_proc_path() {
        let reader = SocketTableReader::new(MockFs::new(), "/host/proc");
        assert_eq!(
            reader.table_path(SocketProtocol::Tcp6),
            PathBuf::from("/host/proc/net/tcp6")
        );
    }
}
