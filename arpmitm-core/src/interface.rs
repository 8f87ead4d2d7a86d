//! Network interface types

use crate::{Error, MacAddr, Result};
use ipnetwork::{IpNetwork, Ipv4Network};
use pnet_datalink::{self, Channel, DataLinkReceiver, DataLinkSender, NetworkInterface};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Network interface the engine sends and sniffs on
#[derive(Debug, Clone)]
pub struct Interface {
    /// Interface name (e.g., "eth0", "wlan0")
    pub name: String,
    /// Interface index
    pub index: u32,
    /// MAC address
    pub mac_address: MacAddr,
    /// First IPv4 address assigned to the interface
    pub ipv4: Option<Ipv4Addr>,
    /// Network the first IPv4 address belongs to
    pub ipv4_network: Option<Ipv4Network>,
    /// Is interface up?
    pub is_up: bool,
}

impl Interface {
    /// Create a new interface
    pub fn new(name: String, index: u32, mac_address: MacAddr) -> Self {
        Self {
            name,
            index,
            mac_address,
            ipv4: None,
            ipv4_network: None,
            is_up: true,
        }
    }

    /// Attach an IPv4 address
    pub fn with_ipv4(mut self, ip: Ipv4Addr) -> Self {
        self.ipv4 = Some(ip);
        self
    }

    /// Get interface by name
    pub fn by_name(name: &str) -> Result<Self> {
        let iface = find_datalink(name)?;
        Self::from_datalink(&iface)
    }

    /// List all available interfaces that carry a hardware address
    pub fn list_all() -> Vec<Self> {
        pnet_datalink::interfaces()
            .iter()
            .filter_map(|iface| Self::from_datalink(iface).ok())
            .collect()
    }

    fn from_datalink(iface: &NetworkInterface) -> Result<Self> {
        let mac = iface
            .mac
            .map(MacAddr::from)
            .filter(|mac| !mac.is_zero())
            .ok_or_else(|| {
                Error::Interface(format!("Interface {} has no hardware address", iface.name))
            })?;

        let ipv4_network = iface.ips.iter().find_map(|network| match network {
            IpNetwork::V4(v4) => Some(*v4),
            _ => None,
        });

        Ok(Self {
            name: iface.name.clone(),
            index: iface.index,
            mac_address: mac,
            ipv4: ipv4_network.map(|net| net.ip()),
            ipv4_network,
            is_up: iface.is_up(),
        })
    }

    /// Get the first IPv4 address of this interface
    pub fn get_ipv4(&self) -> Option<Ipv4Addr> {
        self.ipv4
    }

    /// Open a persistent Ethernet channel on this interface.
    ///
    /// `read_timeout` bounds each blocking receive so readers can poll for
    /// cancellation.
    pub fn open_channel(
        &self,
        read_timeout: Duration,
    ) -> Result<(Box<dyn DataLinkSender>, Box<dyn DataLinkReceiver>)> {
        let iface = find_datalink(&self.name)?;

        let config = pnet_datalink::Config {
            read_timeout: Some(read_timeout),
            promiscuous: true,
            ..Default::default()
        };

        match pnet_datalink::channel(&iface, config) {
            Ok(Channel::Ethernet(tx, rx)) => Ok((tx, rx)),
            Ok(_) => Err(Error::Interface("Unsupported channel type".to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(Error::InsufficientPrivileges(format!(
                    "raw socket on {} requires root: {}",
                    self.name, e
                )))
            }
            Err(e) => Err(Error::Interface(format!("Failed to create channel: {}", e))),
        }
    }
}

fn find_datalink(name: &str) -> Result<NetworkInterface> {
    pnet_datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ipv4 {
            Some(ip) => write!(f, "{} ({}, {})", self.name, self.mac_address, ip),
            None => write!(f, "{} ({})", self.name, self.mac_address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let iface = Interface::new("eth0".to_string(), 2, MacAddr::new([0, 0x11, 0x22, 0x33, 0x44, 0x55]))
            .with_ipv4(Ipv4Addr::new(192, 168, 1, 50));
        assert_eq!(iface.to_string(), "eth0 (00:11:22:33:44:55, 192.168.1.50)");
        assert_eq!(iface.get_ipv4(), Some(Ipv4Addr::new(192, 168, 1, 50)));
    }

    #[test]
    fn test_missing_interface() {
        let result = Interface::by_name("arpmitm-does-not-exist0");
        assert!(matches!(result, Err(Error::InterfaceNotFound(_))));
    }
}
