//! Collectors for Linux `/proc` filesystem.
//!
//! This module provides parsers and readers for the socket tables, process
//! descriptor links and the global system files under `/proc`.

pub mod fd;
pub mod parser;
pub mod port;
pub mod socket;
pub mod system;

pub use fd::DescriptorScanner;
pub use parser::{CpuTicks, ParseError, SocketProtocol, SocketRecord};
pub use port::PortResolver;
pub use socket::SocketTableReader;
pub use system::{CollectError, SystemCollector, logical_cpus};
