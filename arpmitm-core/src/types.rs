//! Address types shared by every arpmitm component

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// MAC Address (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Create a new MAC address
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Broadcast MAC address (ff:ff:ff:ff:ff:ff)
    pub const fn broadcast() -> Self {
        Self([0xff; 6])
    }

    /// Zero MAC address (00:00:00:00:00:00)
    pub const fn zero() -> Self {
        Self([0x00; 6])
    }

    /// Get bytes as slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to array
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0x00; 6]
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(|c| c == ':' || c == '-').collect();
        if parts.len() != 6 {
            return Err(crate::Error::protocol("Invalid MAC address format"));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(crate::Error::protocol("Invalid MAC address octet"));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| crate::Error::protocol("Invalid MAC address hex"))?;
        }

        Ok(MacAddr(bytes))
    }
}

impl From<pnet_datalink::MacAddr> for MacAddr {
    fn from(mac: pnet_datalink::MacAddr) -> Self {
        MacAddr([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5])
    }
}

/// An IPv4 address together with its hardware address, if known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkAddress {
    pub ip: Ipv4Addr,
    /// `None` while the address is unresolved
    pub mac: Option<MacAddr>,
}

impl NetworkAddress {
    pub fn unresolved(ip: Ipv4Addr) -> Self {
        Self { ip, mac: None }
    }

    pub fn resolved(ip: Ipv4Addr, mac: MacAddr) -> Self {
        Self { ip, mac: Some(mac) }
    }

    pub fn is_resolved(&self) -> bool {
        self.mac.is_some()
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mac {
            Some(mac) => write!(f, "{} at {}", self.ip, mac),
            None => write!(f, "{} (unresolved)", self.ip),
        }
    }
}

/// The victim/gateway pair under attack.
///
/// The two IPs are fixed for the life of a run. The hardware addresses are
/// whatever was most recently resolved and are refreshed through
/// [`ArpBinding::update`]; they are never trusted across poison rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpBinding {
    target: NetworkAddress,
    gateway: NetworkAddress,
}

impl ArpBinding {
    pub fn new(target: Ipv4Addr, gateway: Ipv4Addr) -> Self {
        Self {
            target: NetworkAddress::unresolved(target),
            gateway: NetworkAddress::unresolved(gateway),
        }
    }

    pub fn target(&self) -> NetworkAddress {
        self.target
    }

    pub fn gateway(&self) -> NetworkAddress {
        self.gateway
    }

    pub fn target_ip(&self) -> Ipv4Addr {
        self.target.ip
    }

    pub fn gateway_ip(&self) -> Ipv4Addr {
        self.gateway.ip
    }

    /// Record a fresh resolution result for whichever side owns `ip`.
    ///
    /// Returns `false` if `ip` belongs to neither side.
    pub fn update(&mut self, ip: Ipv4Addr, mac: Option<MacAddr>) -> bool {
        if ip == self.target.ip {
            self.target.mac = mac;
            true
        } else if ip == self.gateway.ip {
            self.gateway.mac = mac;
            true
        } else {
            false
        }
    }

    /// Both sides currently have a hardware address
    pub fn is_resolved(&self) -> bool {
        self.target.is_resolved() && self.gateway.is_resolved()
    }
}

impl fmt::Display for ArpBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target {} <-> gateway {}", self.target, self.gateway)
    }
}

/// Ethertype constants
pub mod ethertypes {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const DOT1Q: u16 = 0x8100;
    pub const IPV6: u16 = 0x86DD;
}
