//! IPv4 packet construction and parsing

use crate::checksum::internet_checksum;
use bytes::{BufMut, BytesMut};
use std::net::Ipv4Addr;

/// IP Protocol numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    /// ICMP (1)
    ICMP,
    /// TCP (6)
    TCP,
    /// UDP (17)
    UDP,
    /// Custom protocol number
    Custom(u8),
}

impl IpProtocol {
    pub fn to_u8(self) -> u8 {
        match self {
            IpProtocol::ICMP => 1,
            IpProtocol::TCP => 6,
            IpProtocol::UDP => 17,
            IpProtocol::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => IpProtocol::ICMP,
            6 => IpProtocol::TCP,
            17 => IpProtocol::UDP,
            val => IpProtocol::Custom(val),
        }
    }
}

/// "Don't fragment" bit in the 3-bit flags field
pub const FLAG_DONT_FRAGMENT: u8 = 0b010;
/// "More fragments" bit in the 3-bit flags field
pub const FLAG_MORE_FRAGMENTS: u8 = 0b001;

/// IPv4 packet
#[derive(Debug, Clone)]
pub struct Ipv4Packet {
    /// Internet Header Length in 32-bit words (minimum 5)
    pub ihl: u8,
    /// Type of Service / DSCP
    pub tos: u8,
    /// Total length (header + data) in bytes
    pub total_length: u16,
    pub identification: u16,
    /// 3-bit flags field
    pub flags: u8,
    /// Fragment offset (in 8-byte blocks)
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: IpProtocol,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    /// Options (if IHL > 5)
    pub options: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Ipv4Packet {
    /// Minimum IPv4 header size (without options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Create a new IPv4 packet with default values
    pub fn new(
        source: Ipv4Addr,
        destination: Ipv4Addr,
        protocol: IpProtocol,
        payload: Vec<u8>,
    ) -> Self {
        let total_length = (Self::MIN_HEADER_SIZE + payload.len()) as u16;

        Ipv4Packet {
            ihl: 5,
            tos: 0,
            total_length,
            identification: 0,
            flags: FLAG_DONT_FRAGMENT,
            fragment_offset: 0,
            ttl: 64,
            protocol,
            checksum: 0,
            source,
            destination,
            options: Vec::new(),
            payload,
        }
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_identification(mut self, id: u16) -> Self {
        self.identification = id;
        self
    }

    /// Calculate and update the header checksum
    pub fn calculate_checksum(&mut self) {
        self.checksum = 0;
        self.checksum = internet_checksum(&self.header_bytes());
    }

    fn header_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(Self::MIN_HEADER_SIZE + self.options.len());

        buffer.put_u8((4 << 4) | (self.ihl & 0x0F));
        buffer.put_u8(self.tos);
        buffer.put_u16(self.total_length);
        buffer.put_u16(self.identification);
        buffer.put_u16(((self.flags as u16 & 0x07) << 13) | (self.fragment_offset & 0x1FFF));
        buffer.put_u8(self.ttl);
        buffer.put_u8(self.protocol.to_u8());
        buffer.put_u16(self.checksum);
        buffer.put_slice(&self.source.octets());
        buffer.put_slice(&self.destination.octets());
        buffer.put_slice(&self.options);

        buffer.to_vec()
    }

    /// Convert the packet to bytes with a freshly computed checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut packet = self.clone();
        packet.calculate_checksum();

        let mut buffer = packet.header_bytes();
        buffer.extend_from_slice(&packet.payload);
        buffer
    }

    /// Parse an IPv4 packet from bytes.
    ///
    /// The payload stops at `total_length`, so Ethernet padding after a short
    /// packet is not mistaken for data.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::MIN_HEADER_SIZE {
            return None;
        }

        let version = data[0] >> 4;
        let ihl = data[0] & 0x0F;
        if version != 4 || ihl < 5 {
            return None;
        }

        let header_len = (ihl as usize) * 4;
        if data.len() < header_len {
            return None;
        }

        let total_length = u16::from_be_bytes([data[2], data[3]]);
        let flags_and_offset = u16::from_be_bytes([data[6], data[7]]);

        // Tolerate total_length == 0 (TSO offload on the capturing host)
        let end = match total_length as usize {
            0 => data.len(),
            len if len < header_len => return None,
            len => len.min(data.len()),
        };

        Some(Ipv4Packet {
            ihl,
            tos: data[1],
            total_length,
            identification: u16::from_be_bytes([data[4], data[5]]),
            flags: (flags_and_offset >> 13) as u8,
            fragment_offset: flags_and_offset & 0x1FFF,
            ttl: data[8],
            protocol: IpProtocol::from_u8(data[9]),
            checksum: u16::from_be_bytes([data[10], data[11]]),
            source: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            destination: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
            options: data[Self::MIN_HEADER_SIZE..header_len].to_vec(),
            payload: data[header_len..end].to_vec(),
        })
    }

    /// Get the header size in bytes
    pub fn header_len(&self) -> usize {
        (self.ihl as usize) * 4
    }

    /// Non-first fragments carry no transport header
    pub fn is_fragment(&self) -> bool {
        self.fragment_offset != 0
    }

    pub fn len(&self) -> usize {
        self.total_length as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
