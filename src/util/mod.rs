//! Utility modules for hostprobe.

mod net;

pub use net::{AddrError, Cidr, is_private_ip, is_public_ip, private_cidrs};
