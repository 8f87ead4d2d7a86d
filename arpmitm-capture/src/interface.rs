//! Network interface enumeration and information

use arpmitm_core::{Error, MacAddr, Result};
use pnet_datalink::{self, NetworkInterface};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// Information about a network interface
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    /// Interface name (e.g., "eth0", "wlan0")
    pub name: String,
    /// Human-readable description
    pub description: String,
    pub index: u32,
    /// MAC address if available
    pub mac: Option<MacAddr>,
    /// Addresses assigned to this interface, with their prefix length
    pub ips: Vec<(IpAddr, u8)>,
    pub is_up: bool,
    pub is_loopback: bool,
    pub is_multicast: bool,
}

impl From<&NetworkInterface> for InterfaceInfo {
    fn from(iface: &NetworkInterface) -> Self {
        InterfaceInfo {
            name: iface.name.clone(),
            description: iface.description.clone(),
            index: iface.index,
            mac: iface.mac.map(MacAddr::from),
            ips: iface
                .ips
                .iter()
                .map(|network| (network.ip(), network.prefix()))
                .collect(),
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
            is_multicast: iface.is_multicast(),
        }
    }
}

impl InterfaceInfo {
    /// Up, not loopback, and has a hardware address to poison with
    pub fn is_capture_capable(&self) -> bool {
        self.is_up && !self.is_loopback && self.mac.map_or(false, |mac| !mac.is_zero())
    }

    /// Get the primary IPv4 address if available
    pub fn primary_ipv4(&self) -> Option<Ipv4Addr> {
        self.ips.iter().find_map(|(ip, _)| match ip {
            IpAddr::V4(v4) => Some(*v4),
            _ => None,
        })
    }
}

impl fmt::Display for InterfaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<12}", self.name)?;
        match self.mac {
            Some(mac) => write!(f, " {}", mac)?,
            None => write!(f, " {:<17}", "-")?,
        }
        for (ip, prefix) in &self.ips {
            write!(f, " {}/{}", ip, prefix)?;
        }
        if !self.is_up {
            write!(f, " [down]")?;
        }
        if self.is_loopback {
            write!(f, " [loopback]")?;
        }
        Ok(())
    }
}

/// List all available network interfaces
pub fn list_interfaces() -> Result<Vec<InterfaceInfo>> {
    let interfaces = pnet_datalink::interfaces();

    if interfaces.is_empty() {
        return Err(Error::Capture(
            "No network interfaces found. Are you running with sufficient privileges?".to_string(),
        ));
    }

    Ok(interfaces.iter().map(InterfaceInfo::from).collect())
}

/// Get information about a specific interface by name
pub fn get_interface(name: &str) -> Result<InterfaceInfo> {
    pnet_datalink::interfaces()
        .iter()
        .find(|iface| iface.name == name)
        .map(InterfaceInfo::from)
        .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
}

/// Find the default interface (first up, non-loopback interface with a MAC)
pub fn default_interface() -> Result<InterfaceInfo> {
    list_interfaces()?
        .into_iter()
        .find(|iface| iface.is_capture_capable())
        .ok_or_else(|| Error::Capture("No suitable default interface found".to_string()))
}
