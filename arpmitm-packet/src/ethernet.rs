//! Ethernet II frame construction and parsing

use arpmitm_core::MacAddr;
use bytes::{BufMut, BytesMut};
use std::fmt;

/// EtherType values the engine cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    /// IPv4 (0x0800)
    IPv4,
    /// ARP (0x0806)
    ARP,
    /// VLAN-tagged frame (0x8100)
    VLAN,
    /// IPv6 (0x86DD)
    IPv6,
    /// 802.3 length field instead of a type
    Length(u16),
    /// Anything else
    Custom(u16),
}

impl EtherType {
    /// Convert EtherType to u16 value
    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::IPv4 => 0x0800,
            EtherType::ARP => 0x0806,
            EtherType::VLAN => 0x8100,
            EtherType::IPv6 => 0x86DD,
            EtherType::Length(len) => len,
            EtherType::Custom(val) => val,
        }
    }

    /// Create EtherType from the on-wire type/length field
    pub fn from_u16(value: u16) -> Self {
        match value {
            // Values <= 1500 are 802.3 lengths, not types
            0..=1500 => EtherType::Length(value),
            0x0800 => EtherType::IPv4,
            0x0806 => EtherType::ARP,
            0x8100 => EtherType::VLAN,
            0x86DD => EtherType::IPv6,
            val => EtherType::Custom(val),
        }
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::IPv4 => write!(f, "IPv4"),
            EtherType::ARP => write!(f, "ARP"),
            EtherType::VLAN => write!(f, "VLAN"),
            EtherType::IPv6 => write!(f, "IPv6"),
            EtherType::Length(len) => write!(f, "802.3 len {}", len),
            EtherType::Custom(val) => write!(f, "0x{:04X}", val),
        }
    }
}

/// Ethernet II frame
#[derive(Debug, Clone)]
pub struct EthernetFrame {
    /// Destination MAC address
    pub destination: MacAddr,
    /// Source MAC address
    pub source: MacAddr,
    /// EtherType or length field
    pub ethertype: EtherType,
    /// Payload data (may include trailing padding on received frames)
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    /// Minimum Ethernet frame size (without FCS)
    pub const MIN_FRAME_SIZE: usize = 60;

    /// Ethernet header size (dst + src + type/length)
    pub const HEADER_SIZE: usize = 14;

    /// Create a new Ethernet frame
    pub fn new(
        destination: MacAddr,
        source: MacAddr,
        ethertype: EtherType,
        payload: Vec<u8>,
    ) -> Self {
        EthernetFrame {
            destination,
            source,
            ethertype,
            payload,
        }
    }

    /// Convert the frame to bytes, padded to the minimum frame size
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len());

        buffer.put_slice(self.destination.as_bytes());
        buffer.put_slice(self.source.as_bytes());
        buffer.put_u16(self.ethertype.to_u16());
        buffer.put_slice(&self.payload);

        let mut result = buffer.to_vec();
        if result.len() < Self::MIN_FRAME_SIZE {
            result.resize(Self::MIN_FRAME_SIZE, 0);
        }

        result
    }

    /// Parse an Ethernet frame from bytes
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }

        let mut destination = [0u8; 6];
        destination.copy_from_slice(&data[0..6]);
        let mut source = [0u8; 6];
        source.copy_from_slice(&data[6..12]);

        let ethertype = EtherType::from_u16(u16::from_be_bytes([data[12], data[13]]));

        Some(EthernetFrame {
            destination: MacAddr(destination),
            source: MacAddr(source),
            ethertype,
            payload: data[Self::HEADER_SIZE..].to_vec(),
        })
    }

    /// Get the total frame size in bytes
    pub fn len(&self) -> usize {
        (Self::HEADER_SIZE + self.payload.len()).max(Self::MIN_FRAME_SIZE)
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
