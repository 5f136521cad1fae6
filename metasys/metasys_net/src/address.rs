//! IPv4 socket addresses.

use metasys_core::NetworkOrder;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

/// An IPv4 address and port, stored as a native `sockaddr_in` with the
/// port and address in network byte order.
#[derive(Clone, Copy)]
pub struct InetAddress {
    raw: libc::sockaddr_in,
}

impl InetAddress {
    /// Address `ip`, port `port`.
    pub fn new(ip: [u8; 4], port: u16) -> Self {
        Self {
            raw: libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: port.hton(),
                sin_addr: libc::in_addr {
                    s_addr: u32::from_ne_bytes(ip),
                },
                sin_zero: [0; 8],
            },
        }
    }

    /// The wildcard address on `port`.
    pub fn any(port: u16) -> Self {
        Self::new([0, 0, 0, 0], port)
    }

    /// The loopback address on `port`.
    pub fn localhost(port: u16) -> Self {
        Self::new([127, 0, 0, 1], port)
    }

    /// Wrap a native address.
    pub fn from_raw(raw: libc::sockaddr_in) -> Self {
        Self { raw }
    }

    /// The port in host byte order.
    pub fn port(&self) -> u16 {
        self.raw.sin_port.ntoh()
    }

    /// Replace the port.
    pub fn set_port(&mut self, port: u16) {
        self.raw.sin_port = port.hton();
    }

    /// The four address octets, most significant first.
    pub fn ip(&self) -> [u8; 4] {
        self.raw.sin_addr.s_addr.to_ne_bytes()
    }

    /// Replace the address.
    pub fn set_ip(&mut self, ip: [u8; 4]) {
        self.raw.sin_addr.s_addr = u32::from_ne_bytes(ip);
    }

    /// The native address.
    pub fn as_raw(&self) -> &libc::sockaddr_in {
        &self.raw
    }

    pub(crate) fn as_sockaddr(&self) -> *const libc::sockaddr {
        (&self.raw as *const libc::sockaddr_in).cast()
    }

    pub(crate) fn as_mut_sockaddr(&mut self) -> *mut libc::sockaddr {
        (&mut self.raw as *mut libc::sockaddr_in).cast()
    }

    pub(crate) const fn socklen() -> libc::socklen_t {
        mem::size_of::<libc::sockaddr_in>() as libc::socklen_t
    }

    fn key(&self) -> ([u8; 4], u16) {
        (self.ip(), self.port())
    }
}

impl Default for InetAddress {
    fn default() -> Self {
        Self::any(0)
    }
}

impl PartialEq for InetAddress {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for InetAddress {}

impl Hash for InetAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for InetAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InetAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for InetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.ip();
        write!(f, "{}.{}.{}.{}:{}", a, b, c, d, self.port())
    }
}

impl fmt::Debug for InetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InetAddress({})", self)
    }
}

impl From<SocketAddrV4> for InetAddress {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(addr.ip().octets(), addr.port())
    }
}

impl From<InetAddress> for SocketAddrV4 {
    fn from(addr: InetAddress) -> Self {
        SocketAddrV4::new(Ipv4Addr::from(addr.ip()), addr.port())
    }
}

impl FromStr for InetAddress {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddrV4>().map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_is_network_order() {
        let addr = InetAddress::localhost(0x1f90);
        assert_eq!(addr.as_raw().sin_port.to_ne_bytes(), [0x1f, 0x90]);
        assert_eq!(addr.port(), 8080);
        assert_eq!(addr.as_raw().sin_family, libc::AF_INET as libc::sa_family_t);
    }

    #[test]
    fn test_ip_octets() {
        let mut addr = InetAddress::new([10, 1, 2, 3], 22);
        assert_eq!(addr.ip(), [10, 1, 2, 3]);
        assert_eq!(addr.as_raw().sin_addr.s_addr.to_ne_bytes(), [10, 1, 2, 3]);
        addr.set_ip([192, 168, 0, 1]);
        addr.set_port(443);
        assert_eq!(addr.to_string(), "192.168.0.1:443");
    }

    #[test]
    fn test_ordering_by_ip_then_port() {
        let low = InetAddress::new([10, 0, 0, 1], 9000);
        let high = InetAddress::new([10, 0, 0, 2], 80);
        let higher_port = InetAddress::new([10, 0, 0, 2], 81);
        assert!(low < high);
        assert!(high < higher_port);
        assert_eq!(InetAddress::any(5), InetAddress::new([0, 0, 0, 0], 5));
    }

    #[test]
    fn test_std_conversions() {
        let addr: InetAddress = "127.0.0.1:6000".parse().unwrap();
        assert_eq!(addr, InetAddress::localhost(6000));
        let std_addr: SocketAddrV4 = addr.into();
        assert_eq!(std_addr.port(), 6000);
        assert!("not an address".parse::<InetAddress>().is_err());
    }
}
