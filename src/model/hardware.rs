//! Hardware identity and topology.
//!
//! Sources: `/proc/cpuinfo` and the firmware identity files under
//! `/sys/class/dmi/id/`.

use serde::{Deserialize, Serialize};

/// Installed CPU topology.
///
/// Source: `/proc/cpuinfo`
///
/// For well-formed input `cpus <= cores <= threads`. When the dump cannot
/// be read every field except `threads` stays zero/empty.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct CpuTopology {
    /// CPU vendor, e.g. `GenuineIntel`.
    /// Source: first `vendor_id`
    pub vendor: String,

    /// Whitespace-normalised model string.
    /// Source: first `model name`
    pub model: String,

    /// Clock rate in MHz, verbatim.
    /// Source: first `cpu MHz`
    pub speed: String,

    /// Cache size in KB.
    /// Source: first `cache size` of the form `<digits> KB`
    pub cache: u32,

    /// Number of distinct physical packages.
    /// Source: distinct `physical id` values
    pub cpus: u32,

    /// Number of physical cores.
    /// Source: distinct (`physical id`, `core id`) pairs
    pub cores: u32,

    /// Number of logical processors available to this process.
    pub threads: u32,
}

/// BIOS identity.
///
/// Source: `/sys/class/dmi/id/bios_{vendor,version,date}`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct BiosInfo {
    pub vendor: String,
    pub version: String,
    pub date: String,
}

/// Mainboard identity.
///
/// Source: `/sys/class/dmi/id/board_{name,vendor,version,serial,asset_tag}`
///
/// `board_serial` is usually readable by root only; it is empty otherwise.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct BoardInfo {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub serial: String,
    #[serde(rename = "assettag")]
    pub asset_tag: String,
}
