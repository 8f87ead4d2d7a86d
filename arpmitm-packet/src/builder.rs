//! Packet builder for constructing frames with a fluent API
//!
//! Layers are described first and serialized in one `build()` call, from
//! the innermost payload outwards, so checksums always cover final bytes.

use crate::arp::ArpPacket;
use crate::ethernet::{EtherType, EthernetFrame};
use crate::ip::{IpProtocol, Ipv4Packet};
use crate::tcp::{TcpFlags, TcpPort, TcpSegment};
use arpmitm_core::{Error, MacAddr, Result};
use std::net::Ipv4Addr;

/// Layer 2 frame type
#[derive(Debug, Clone)]
enum Layer2 {
    Ethernet {
        src: MacAddr,
        dst: MacAddr,
        ethertype: EtherType,
    },
}

/// Layer 3 packet type
#[derive(Debug, Clone)]
enum Layer3 {
    Arp(ArpPacket),
    Ipv4 {
        src: Ipv4Addr,
        dst: Ipv4Addr,
        ttl: u8,
        identification: u16,
    },
}

/// Layer 4 segment type
#[derive(Debug, Clone, Copy)]
enum Layer4 {
    Tcp {
        src_port: u16,
        dst_port: u16,
        seq: u32,
        ack: u32,
        flags: TcpFlags,
        window: u16,
    },
}

/// Packet builder with fluent API for constructing network frames
///
/// # Examples
///
/// ```
/// use std::net::Ipv4Addr;
/// use arpmitm_core::MacAddr;
/// use arpmitm_packet::PacketBuilder;
/// use arpmitm_packet::ethernet::EtherType;
/// use arpmitm_packet::tcp::TcpFlags;
///
/// let frame = PacketBuilder::new()
///     .ethernet(
///         MacAddr::new([0x02, 0, 0, 0, 0, 0x14]),
///         MacAddr::new([0x02, 0, 0, 0, 0, 0x01]),
///         EtherType::IPv4,
///     )
///     .ipv4(Ipv4Addr::new(192, 168, 1, 20), Ipv4Addr::new(93, 184, 216, 34))
///     .tcp(51000, 80, 1, 1, TcpFlags::PSH_ACK)
///     .payload(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n".to_vec())
///     .build()
///     .unwrap();
/// ```
pub struct PacketBuilder {
    layer2: Option<Layer2>,
    layer3: Option<Layer3>,
    layer4: Option<Layer4>,
    payload: Vec<u8>,
}

impl PacketBuilder {
    /// Create a new packet builder
    pub fn new() -> Self {
        PacketBuilder {
            layer2: None,
            layer3: None,
            layer4: None,
            payload: Vec::new(),
        }
    }

    /// Add an Ethernet layer
    pub fn ethernet(mut self, src: MacAddr, dst: MacAddr, ethertype: EtherType) -> Self {
        self.layer2 = Some(Layer2::Ethernet {
            src,
            dst,
            ethertype,
        });
        self
    }

    /// Carry an ARP packet. The Ethernet type should be `EtherType::ARP`.
    pub fn arp(mut self, packet: ArpPacket) -> Self {
        self.layer3 = Some(Layer3::Arp(packet));
        self
    }

    /// Add an IPv4 layer
    pub fn ipv4(mut self, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        self.layer3 = Some(Layer3::Ipv4 {
            src,
            dst,
            ttl: 64,
            identification: 0,
        });
        self
    }

    /// Set the TTL for the IPv4 layer
    ///
    /// Must be called after `ipv4()`.
    pub fn ttl(mut self, new_ttl: u8) -> Self {
        if let Some(Layer3::Ipv4 { ref mut ttl, .. }) = self.layer3 {
            *ttl = new_ttl;
        }
        self
    }

    /// Set the identification for the IPv4 layer
    ///
    /// Must be called after `ipv4()`.
    pub fn identification(mut self, id: u16) -> Self {
        if let Some(Layer3::Ipv4 {
            ref mut identification,
            ..
        }) = self.layer3
        {
            *identification = id;
        }
        self
    }

    /// Add a TCP layer
    pub fn tcp(mut self, src_port: u16, dst_port: u16, seq: u32, ack: u32, flags: TcpFlags) -> Self {
        self.layer4 = Some(Layer4::Tcp {
            src_port,
            dst_port,
            seq,
            ack,
            flags,
            window: 65535,
        });
        self
    }

    /// Set the payload data
    pub fn payload(mut self, data: Vec<u8>) -> Self {
        self.payload = data;
        self
    }

    /// Build the complete frame
    ///
    /// # Errors
    ///
    /// Returns `Error::PacketConstruction` for an impossible layer stack
    /// (TCP without IPv4, TCP over ARP, or no Ethernet layer).
    pub fn build(self) -> Result<Vec<u8>> {
        let mut packet_data = self.payload;

        if let Some(Layer4::Tcp {
            src_port,
            dst_port,
            seq,
            ack,
            flags,
            window,
        }) = self.layer4
        {
            let (src, dst) = match self.layer3 {
                Some(Layer3::Ipv4 { src, dst, .. }) => (src, dst),
                Some(Layer3::Arp(_)) => {
                    return Err(Error::PacketConstruction("TCP cannot ride on ARP".into()))
                }
                None => return Err(Error::PacketConstruction("Layer 4 requires Layer 3".into())),
            };

            let mut tcp = TcpSegment::new(
                TcpPort::new(src_port),
                TcpPort::new(dst_port),
                seq,
                ack,
                flags,
                window,
                packet_data,
            );
            tcp.calculate_checksum(src, dst);
            packet_data = tcp.to_bytes();
        }

        match self.layer3 {
            Some(Layer3::Arp(arp)) => packet_data = arp.serialize(),
            Some(Layer3::Ipv4 {
                src,
                dst,
                ttl,
                identification,
            }) => {
                let protocol = match self.layer4 {
                    Some(Layer4::Tcp { .. }) => IpProtocol::TCP,
                    None => IpProtocol::Custom(0),
                };

                packet_data = Ipv4Packet::new(src, dst, protocol, packet_data)
                    .with_ttl(ttl)
                    .with_identification(identification)
                    .to_bytes();
            }
            None => {}
        }

        let Layer2::Ethernet {
            src,
            dst,
            ethertype,
        } = self
            .layer2
            .ok_or_else(|| Error::PacketConstruction("Layer 2 is required".into()))?;

        Ok(EthernetFrame::new(dst, src, ethertype, packet_data).to_bytes())
    }
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}
