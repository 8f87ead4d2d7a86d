//! ARP packet structure and parsing

use crate::builder::PacketBuilder;
use crate::ethernet::{EtherType, EthernetFrame};
use arpmitm_core::{Error, MacAddr, Result};
use bytes::{BufMut, BytesMut};
use std::net::Ipv4Addr;

/// Hardware types
pub const HTYPE_ETHERNET: u16 = 1;

/// Protocol types
pub const PTYPE_IPV4: u16 = 0x0800;

/// ARP payload size for Ethernet/IPv4
pub const ARP_PACKET_SIZE: usize = 28;

/// ARP Operation Codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOpcode {
    /// ARP Request
    Request = 1,
    /// ARP Reply
    Reply = 2,
    /// RARP Request
    RarpRequest = 3,
    /// RARP Reply
    RarpReply = 4,
}

impl ArpOpcode {
    pub fn from_u16(val: u16) -> Option<Self> {
        match val {
            1 => Some(Self::Request),
            2 => Some(Self::Reply),
            3 => Some(Self::RarpRequest),
            4 => Some(Self::RarpReply),
            _ => None,
        }
    }
}

/// ARP Packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    /// Hardware type (1 for Ethernet)
    pub htype: u16,
    /// Protocol type (0x0800 for IPv4)
    pub ptype: u16,
    /// Hardware address length (6 for MAC)
    pub hlen: u8,
    /// Protocol address length (4 for IPv4)
    pub plen: u8,
    pub operation: ArpOpcode,
    pub sender_hw_addr: MacAddr,
    pub sender_proto_addr: Ipv4Addr,
    pub target_hw_addr: MacAddr,
    pub target_proto_addr: Ipv4Addr,
}

impl ArpPacket {
    /// Who-has request for `target_ip`
    pub fn new_request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            htype: HTYPE_ETHERNET,
            ptype: PTYPE_IPV4,
            hlen: 6,
            plen: 4,
            operation: ArpOpcode::Request,
            sender_hw_addr: sender_mac,
            sender_proto_addr: sender_ip,
            target_hw_addr: MacAddr::zero(),
            target_proto_addr: target_ip,
        }
    }

    /// "`sender_ip` is at `sender_mac`", addressed to `target_mac`/`target_ip`
    pub fn new_reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        Self {
            htype: HTYPE_ETHERNET,
            ptype: PTYPE_IPV4,
            hlen: 6,
            plen: 4,
            operation: ArpOpcode::Reply,
            sender_hw_addr: sender_mac,
            sender_proto_addr: sender_ip,
            target_hw_addr: target_mac,
            target_proto_addr: target_ip,
        }
    }

    /// Create gratuitous ARP (announcement)
    pub fn new_gratuitous(mac: MacAddr, ip: Ipv4Addr) -> Self {
        Self {
            htype: HTYPE_ETHERNET,
            ptype: PTYPE_IPV4,
            hlen: 6,
            plen: 4,
            operation: ArpOpcode::Request,
            sender_hw_addr: mac,
            sender_proto_addr: ip,
            target_hw_addr: MacAddr::zero(),
            target_proto_addr: ip,
        }
    }

    /// Parse an ARP payload (the bytes after the Ethernet header).
    ///
    /// Only Ethernet/IPv4 ARP is accepted; trailing padding is ignored.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ARP_PACKET_SIZE {
            return Err(Error::PacketParsing(format!(
                "ARP packet too short: {} bytes",
                data.len()
            )));
        }

        let htype = u16::from_be_bytes([data[0], data[1]]);
        let ptype = u16::from_be_bytes([data[2], data[3]]);
        let hlen = data[4];
        let plen = data[5];
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 || hlen != 6 || plen != 4 {
            return Err(Error::PacketParsing(format!(
                "unsupported ARP format htype={} ptype=0x{:04x} hlen={} plen={}",
                htype, ptype, hlen, plen
            )));
        }

        let op_val = u16::from_be_bytes([data[6], data[7]]);
        let operation = ArpOpcode::from_u16(op_val)
            .ok_or_else(|| Error::PacketParsing(format!("invalid ARP opcode {}", op_val)))?;

        let mut sender_hw_addr = [0u8; 6];
        sender_hw_addr.copy_from_slice(&data[8..14]);
        let mut target_hw_addr = [0u8; 6];
        target_hw_addr.copy_from_slice(&data[18..24]);

        Ok(Self {
            htype,
            ptype,
            hlen,
            plen,
            operation,
            sender_hw_addr: MacAddr(sender_hw_addr),
            sender_proto_addr: Ipv4Addr::new(data[14], data[15], data[16], data[17]),
            target_hw_addr: MacAddr(target_hw_addr),
            target_proto_addr: Ipv4Addr::new(data[24], data[25], data[26], data[27]),
        })
    }

    /// Serialize ARP packet to bytes
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(ARP_PACKET_SIZE);

        buf.put_u16(self.htype);
        buf.put_u16(self.ptype);
        buf.put_u8(self.hlen);
        buf.put_u8(self.plen);
        buf.put_u16(self.operation as u16);
        buf.put_slice(self.sender_hw_addr.as_bytes());
        buf.put_slice(&self.sender_proto_addr.octets());
        buf.put_slice(self.target_hw_addr.as_bytes());
        buf.put_slice(&self.target_proto_addr.octets());

        buf.to_vec()
    }

    /// Wrap the packet in an Ethernet frame from `src` to `dst`
    pub fn to_frame(&self, src: MacAddr, dst: MacAddr) -> Result<Vec<u8>> {
        PacketBuilder::new()
            .ethernet(src, dst, EtherType::ARP)
            .arp(self.clone())
            .build()
    }

    /// Extract an ARP packet from a full Ethernet frame, if it carries one
    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        let eth = EthernetFrame::from_bytes(frame)?;
        if eth.ethertype != EtherType::ARP {
            return None;
        }
        Self::parse(&eth.payload).ok()
    }

    /// Check if this is a request
    pub fn is_request(&self) -> bool {
        self.operation == ArpOpcode::Request
    }

    /// Check if this is a reply
    pub fn is_reply(&self) -> bool {
        self.operation == ArpOpcode::Reply
    }

    /// Check if this is gratuitous ARP
    pub fn is_gratuitous(&self) -> bool {
        self.sender_proto_addr == self.target_proto_addr
    }
}
