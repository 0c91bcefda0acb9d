//! hostprobe - host introspection library.
//!
//! Provides:
//! - `collector` - socket tables, port owners, CPU topology, host snapshot,
//!   firmware identity
//! - `model` - serialisable values produced by the collectors
//! - `runtime` - allocator statistics and memory purge triggers
//! - `util` - IP address classification

pub mod collector;
pub mod model;
pub mod runtime;
pub mod util;
