//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions that parse the content of various `/proc` files
//! into structured data. They are designed to be easily testable with string inputs.

use std::collections::HashSet;

use serde::Serialize;

use crate::model::CpuTopology;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

// ============ Socket Table Parser ============

/// Kernel state code of a socket in the accept-ready (`LISTEN`) state.
pub const TCP_LISTEN: u8 = 0x0A;

/// Minimum number of whitespace-separated columns in a socket table row
/// (up to and including the inode column).
const SOCKET_MIN_FIELDS: usize = 10;

/// Protocol of a `/proc/net/*` socket table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketProtocol {
    Tcp,
    Udp,
    Tcp6,
    Udp6,
}

impl SocketProtocol {
    /// Tables in the order the port resolver scans them.
    pub const ALL: [SocketProtocol; 4] = [
        SocketProtocol::Tcp,
        SocketProtocol::Udp,
        SocketProtocol::Tcp6,
        SocketProtocol::Udp6,
    ];

    /// File name of the table under `/proc/net/`.
    pub fn table_name(self) -> &'static str {
        match self {
            SocketProtocol::Tcp => "tcp",
            SocketProtocol::Udp => "udp",
            SocketProtocol::Tcp6 => "tcp6",
            SocketProtocol::Udp6 => "udp6",
        }
    }
}

impl std::fmt::Display for SocketProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// One row of `/proc/net/{tcp,udp,tcp6,udp6}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocketRecord {
    pub protocol: SocketProtocol,
    pub local_port: u16,
    /// Connection state code (`st` column).
    pub state: u8,
    /// Socket inode, verbatim from the table.
    pub inode: String,
}

impl SocketRecord {
    pub fn is_listening(&self) -> bool {
        self.state == TCP_LISTEN
    }

    pub fn inode_number(&self) -> Option<u64> {
        self.inode.parse().ok()
    }
}

/// Decodes the port half of a `ADDR:PORT` socket address (`"0100007F:1F90"` -> 8080).
pub fn parse_hex_port(addr: &str) -> Option<u16> {
    let (_, port) = addr.rsplit_once(':')?;
    u16::from_str_radix(port, 16).ok()
}

/// Parses a single socket table row.
///
/// Format:
/// `sl local_address rem_address st tx_queue:rx_queue tr:tm->when retrnsmt uid timeout inode ...`
///
/// Returns `None` for the header line and for rows that are too short or
/// carry undecodable port/state columns.
pub fn parse_socket_line(line: &str, protocol: SocketProtocol) -> Option<SocketRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < SOCKET_MIN_FIELDS {
        return None;
    }

    let local_port = parse_hex_port(fields[1])?;
    let state = u8::from_str_radix(fields[3], 16).ok()?;

    Some(SocketRecord {
        protocol,
        local_port,
        state,
        inode: fields[9].to_string(),
    })
}

// ============ CPU Info Parser ============

/// Splits a `/proc/cpuinfo` line of the form `key<TAB>+: value`.
///
/// Lines without at least one tab directly before the colon (blank
/// separators, `power management:`) are rejected.
pub fn split_cpuinfo_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(":")?;
    if !key.ends_with('\t') {
        return None;
    }
    let value = value.strip_prefix(' ')?;
    Some((key.trim_end_matches('\t'), value))
}

/// Collapses runs of spaces and tightens the first `"- "` to `"-"`.
///
/// `"Intel(R)  Xeon(R)- Platinum"` becomes `"Intel(R) Xeon(R)-Platinum"`.
pub fn normalize_model_name(model: &str) -> String {
    let mut collapsed = String::with_capacity(model.len());
    let mut prev_space = false;
    for c in model.chars() {
        if c == ' ' {
            if !prev_space {
                collapsed.push(c);
            }
            prev_space = true;
        } else {
            collapsed.push(c);
            prev_space = false;
        }
    }
    collapsed.replacen("- ", "-", 1)
}

/// Parses a `cache size` value. Only the exact form `<digits> KB` is accepted.
pub fn parse_cache_size(value: &str) -> Option<u32> {
    let digits = value.strip_suffix(" KB")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parses `/proc/cpuinfo` content into aggregate topology.
///
/// `threads` is the logical processor count obtained elsewhere; the dump is
/// only used for packages, cores and identifying strings.
pub fn parse_cpuinfo(content: &str, threads: u32) -> CpuTopology {
    let mut topo = CpuTopology {
        threads,
        ..Default::default()
    };

    let mut packages: HashSet<&str> = HashSet::new();
    let mut cores: HashSet<String> = HashSet::new();
    let mut package_id = "";

    for line in content.lines() {
        let Some((key, value)) = split_cpuinfo_line(line) else {
            continue;
        };

        match key {
            "physical id" => {
                package_id = value;
                packages.insert(value);
            }
            "core id" => {
                // Core ids restart per package
                cores.insert(format!("{}/{}", package_id, value));
            }
            "vendor_id" if topo.vendor.is_empty() => topo.vendor = value.to_string(),
            "model name" if topo.model.is_empty() => topo.model = normalize_model_name(value),
            "cpu MHz" if topo.speed.is_empty() => topo.speed = value.to_string(),
            "cache size" if topo.cache == 0 => topo.cache = parse_cache_size(value).unwrap_or(0),
            _ => {}
        }
    }

    topo.cpus = packages.len() as u32;
    topo.cores = cores.len() as u32;
    topo
}

// ============ Global Stat Parser ============

/// CPU tick counters from the aggregate `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTicks {
    pub user: u64,
    pub idle: u64,
    /// Sum of every column on the line.
    pub total: u64,
}

impl CpuTicks {
    /// Returns `(user / total, idle / total)`, or zeros when `total` is zero.
    pub fn ratios(&self) -> (f64, f64) {
        if self.total == 0 {
            return (0.0, 0.0);
        }
        let total = self.total as f64;
        (self.user as f64 / total, self.idle as f64 / total)
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
///
/// Format: `cpu user nice system idle iowait irq softirq steal guest guest_nice`
pub fn parse_cpu_ticks(content: &str) -> Result<CpuTicks, ParseError> {
    let line = content
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| ParseError::new("missing aggregate cpu line in stat"))?;

    let mut ticks = CpuTicks::default();
    for (idx, field) in line.split_whitespace().skip(1).enumerate() {
        let value: u64 = field.parse().unwrap_or(0);
        ticks.total = ticks.total.saturating_add(value);
        match idx {
            0 => ticks.user = value,
            3 => ticks.idle = value,
            _ => {}
        }
    }

    Ok(ticks)
}

// ============ Memory Info Parser ============

/// Parsed data from `/proc/meminfo`, in kB.
#[derive(Debug, Clone, Default)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_free: u64,
}

/// Parses `/proc/meminfo` content.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();
    let mut seen_total = false;

    let parse_kb = |line: &str| -> u64 {
        line.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            info.mem_total = parse_kb(line);
            seen_total = true;
        } else if line.starts_with("MemFree:") {
            info.mem_free = parse_kb(line);
        }
    }

    if !seen_total {
        return Err(ParseError::new("missing MemTotal in meminfo"));
    }

    Ok(info)
}

// ============ Process Parsers ============

/// Extracts `starttime` (field 22, jiffies after boot) from `/proc/[pid]/stat`.
///
/// The comm field can contain spaces and parentheses, so fields are counted
/// from the last `)`.
pub fn parse_proc_starttime(content: &str) -> Result<u64, ParseError> {
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;

    // state is fields[0], starttime is the 22nd field overall
    content[close_paren + 1..]
        .split_whitespace()
        .nth(19)
        .ok_or_else(|| ParseError::new("missing field starttime"))?
        .parse()
        .map_err(|_| ParseError::new("invalid starttime"))
}

/// Parses the first column of `/proc/uptime` (seconds since boot).
pub fn parse_uptime(content: &str) -> Result<f64, ParseError> {
    let uptime: f64 = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?
        .parse()
        .map_err(|_| ParseError::new("invalid uptime"))?;

    if !uptime.is_finite() {
        return Err(ParseError::new("invalid uptime"));
    }
    Ok(uptime)
}

/// Returns the `Threads:` value of `/proc/[pid]/status`.
pub fn parse_status_threads(content: &str) -> Option<u32> {
    content.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim() == "Threads" {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
