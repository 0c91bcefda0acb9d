//! Structured host facts produced by the collectors.
//!
//! Every type here is a plain value object intended for serialization by
//! the caller (the `hostprobe` binary prints them as JSON).

mod hardware;
mod system;

pub use hardware::{BiosInfo, BoardInfo, CpuTopology};
pub use system::{RuntimeStats, SystemSnapshot, UsageTriple};
