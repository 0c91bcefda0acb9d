//! Host facts collector for Linux.
//!
//! This module provides infrastructure for reading socket tables, process
//! descriptors, CPU/memory/disk usage and firmware identity from `/proc` and
//! `/sys`, with support for mocking for testing on any platform.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Collector                           │
//! │  ┌──────────────────┐ ┌─────────────────┐ ┌───────────────┐  │
//! │  │  PortResolver    │ │ SystemCollector │ │ DmiCollector  │  │
//! │  │  - /proc/net/*   │ │ - /proc/stat    │ │ - bios_*      │  │
//! │  │  - /proc/[pid]/fd│ │ - /proc/meminfo │ │ - board_*     │  │
//! │  └────────┬─────────┘ │ - /proc/cpuinfo │ └───────┬───────┘  │
//! │           │           └────────┬────────┘         │          │
//! │           └────────────────────┼──────────────────┘          │
//! │                                │                             │
//! │                         ┌──────▼──────┐                      │
//! │                         │  FileSystem │ (trait)              │
//! │                         └──────┬──────┘                      │
//! └────────────────────────────────┼─────────────────────────────┘
//!                                  │
//!                  ┌───────────────┼───────────────┐
//!                  │               │               │
//!           ┌──────▼──────┐ ┌──────▼──────┐ ┌──────▼──────┐
//!           │   RealFs    │ │   MockFs    │ │  Scenarios  │
//!           │ (Linux)     │ │ (Testing)   │ │ (Fixtures)  │
//!           └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production (Linux)
//!
//! ```ignore
//! use hostprobe::collector::{Collector, RealFs};
//!
//! let fs = RealFs::new();
//! let mut collector = Collector::new(fs, "/proc");
//! let snapshot = collector.collect_snapshot();
//! let owner = collector.pid_by_port(5432);
//! ```
//!
//! ## Testing (with MockFs)
//!
//! ```
//! use hostprobe::collector::{Collector, MockFs};
//!
//! let fs = MockFs::listening_services();
//! let mut collector = Collector::new(fs, "/proc");
//! assert_eq!(collector.pid_by_port(8080), Some(777));
//! assert_eq!(collector.collect_snapshot().server_name, "db-primary");
//! ```

#[allow(clippy::module_inception)]
mod collector;
pub mod dmi;
pub mod mock;
pub mod procfs;
pub mod traits;

pub use collector::{Collector, CollectorTiming};
pub use dmi::{DEFAULT_DMI_PATH, DmiCollector};
pub use mock::MockFs;
pub use procfs::{CollectError, PortResolver, SocketProtocol, SocketRecord};
pub use traits::{FileSystem, FsUsage, RealFs};
