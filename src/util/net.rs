//! IP address classification.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

/// Error returned for caller input that is not an IP literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddrError {
    InvalidIp,
}

impl std::fmt::Display for AddrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddrError::InvalidIp => write!(f, "address is not valid ip"),
        }
    }
}

impl std::error::Error for AddrError {}

/// An address block: network address plus prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    const fn v4(a: u8, b: u8, c: u8, d: u8, prefix: u8) -> Self {
        Self {
            network: IpAddr::V4(Ipv4Addr::new(a, b, c, d)),
            prefix,
        }
    }

    const fn v6(network: Ipv6Addr, prefix: u8) -> Self {
        Self {
            network: IpAddr::V6(network),
            prefix,
        }
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Returns true if `ip` lies inside this block.
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) match IPv4 blocks.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, normalize(ip)) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

fn prefix_mask_u32(prefix: u8) -> u32 {
    match prefix {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - p),
    }
}

fn prefix_mask_u128(prefix: u8) -> u128 {
    match prefix {
        0 => 0,
        p if p >= 128 => u128::MAX,
        p => u128::MAX << (128 - p),
    }
}

fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

static PRIVATE_CIDRS: LazyLock<Vec<Cidr>> = LazyLock::new(|| {
    vec![
        Cidr::v4(127, 0, 0, 0, 8),
        Cidr::v4(10, 0, 0, 0, 8),
        Cidr::v4(172, 16, 0, 0, 12),
        Cidr::v4(192, 168, 0, 0, 16),
        Cidr::v4(169, 254, 0, 0, 16),
        Cidr::v6(Ipv6Addr::LOCALHOST, 128),
        Cidr::v6(Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7),
        Cidr::v6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10),
    ]
});

/// Loopback, private and link-local blocks for IPv4 and IPv6.
///
/// Built on first use and shared for the lifetime of the process.
pub fn private_cidrs() -> &'static [Cidr] {
    &PRIVATE_CIDRS
}

/// Returns whether `address` belongs to one of [`private_cidrs`].
pub fn is_private_ip(address: &str) -> Result<bool, AddrError> {
    let ip: IpAddr = address.parse().map_err(|_| AddrError::InvalidIp)?;
    Ok(private_cidrs().iter().any(|cidr| cidr.contains(ip)))
}

/// Returns whether `ip` is a globally routable IPv4 address.
///
/// Loopback, link-local (unicast and multicast) and RFC 1918 ranges are not
/// public. IPv6 addresses, other than IPv4-mapped ones, are never reported
/// as public.
pub fn is_public_ip(ip: IpAddr) -> bool {
    let v4 = match normalize(ip) {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => return false,
    };

    if v4.is_loopback() || v4.is_link_local() || is_link_local_multicast(v4) {
        return false;
    }

    let [a, b, ..] = v4.octets();
    !matches!((a, b), (10, _) | (172, 16..=31) | (192, 168))
}

/// 224.0.0.0/24
fn is_link_local_multicast(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    a == 224 && b == 0 && c == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_cidrs_table() {
        let table: Vec<String> = private_cidrs().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            table,
            vec![
                "127.0.0.0/8",
                "10.0.0.0/8",
                "172.16.0.0/12",
                "192.168.0.0/16",
                "169.254.0.0/16",
                "::1/128",
                "fc00::/7",
                "fe80::/10",
            ]
        );
        assert!(std::ptr::eq(private_cidrs(), private_cidrs()));
    }

    #[test]
    fn test_is_private_ip() {
        assert_eq!(is_private_ip("192.168.1.1"), Ok(true));
        assert_eq!(is_private_ip("10.255.255.255"), Ok(true));
        assert_eq!(is_private_ip("172.16.0.1"), Ok(true));
        assert_eq!(is_private_ip("172.31.255.255"), Ok(true));
        assert_eq!(is_private_ip("127.0.0.1"), Ok(true));
        assert_eq!(is_private_ip("169.254.10.20"), Ok(true));

        assert_eq!(is_private_ip("8.8.8.8"), Ok(false));
        assert_eq!(is_private_ip("172.32.0.1"), Ok(false));
        assert_eq!(is_private_ip("192.169.0.1"), Ok(false));
    }

    #[test]
    fn test_is_private_ip_v6() {
        assert_eq!(is_private_ip("::1"), Ok(true));
        assert_eq!(is_private_ip("fd12:3456::1"), Ok(true));
        assert_eq!(is_private_ip("fe80::1ff:fe23:4567:890a"), Ok(true));
        assert_eq!(is_private_ip("::ffff:10.0.0.1"), Ok(true));
        assert_eq!(is_private_ip("2001:4860:4860::8888"), Ok(false));
    }

    #[test]
    fn test_is_private_ip_invalid() {
        assert_eq!(is_private_ip("not-an-ip"), Err(AddrError::InvalidIp));
        assert_eq!(is_private_ip(""), Err(AddrError::InvalidIp));
        assert_eq!(is_private_ip("10.0.0.1:80"), Err(AddrError::InvalidIp));
        assert_eq!(
            AddrError::InvalidIp.to_string(),
            "address is not valid ip"
        );
    }

    #[test]
    fn test_is_public_ip() {
        let ip = |s: &str| s.parse::<IpAddr>().unwrap();

        assert!(is_public_ip(ip("8.8.8.8")));
        assert!(is_public_ip(ip("172.32.0.1")));
        assert!(is_public_ip(ip("::ffff:1.1.1.1")));

        assert!(!is_public_ip(ip("127.0.0.1")));
        assert!(!is_public_ip(ip("10.1.2.3")));
        assert!(!is_public_ip(ip("172.20.0.1")));
        assert!(!is_public_ip(ip("192.168.0.10")));
        assert!(!is_public_ip(ip("169.254.1.1")));
        assert!(!is_public_ip(ip("224.0.0.251")));
        assert!(!is_public_ip(ip("2001:4860:4860::8888")));
    }

    #[test]
    fn test_cidr_contains_edges() {
        let block = Cidr::v4(172, 16, 0, 0, 12);
        assert!(block.contains("172.16.0.0".parse().unwrap()));
        assert!(block.contains("172.31.255.255".parse().unwrap()));
        assert!(!block.contains("172.15.255.255".parse().unwrap()));
        assert!(!block.contains("fc00::1".parse().unwrap()));
        assert_eq!(block.prefix(), 12);
        assert_eq!(block.network(), IpAddr::V4(Ipv4Addr::new(172, 16, 0, 0)));
    }
}
