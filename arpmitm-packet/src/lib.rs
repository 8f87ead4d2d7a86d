//! Packet construction and parsing for arpmitm
//!
//! Hand-written codecs for the layers the engine touches:
//!
//! - [`ethernet`] - Ethernet II frames
//! - [`arp`] - ARP requests and replies, forged or genuine
//! - [`ip`] / [`tcp`] - enough of IPv4 and TCP to reach application payloads
//! - [`http`] - HTTP/1.x request and status line parsing
//! - [`frame`] - one-shot classification of captured frames into a [`FrameLayer`]
//! - [`builder`] - fluent [`PacketBuilder`] used for ARP frames and test traffic
//! - [`checksum`] - RFC 1071 Internet checksum
//!
//! # Building a forged ARP reply
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use arpmitm_core::MacAddr;
//! use arpmitm_packet::ArpPacket;
//!
//! let operator = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
//! let victim = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x14]);
//!
//! // "192.168.1.1 is at <operator>", sent to the victim
//! let reply = ArpPacket::new_reply(
//!     operator,
//!     Ipv4Addr::new(192, 168, 1, 1),
//!     victim,
//!     Ipv4Addr::new(192, 168, 1, 20),
//! );
//! let frame = reply.to_frame(operator, victim).unwrap();
//! assert_eq!(frame.len(), 60);
//! ```

pub mod arp;
pub mod builder;
pub mod checksum;
pub mod ethernet;
pub mod frame;
pub mod http;
pub mod ip;
pub mod tcp;

pub use arp::{ArpOpcode, ArpPacket};
pub use builder::PacketBuilder;
pub use checksum::{internet_checksum, transport_checksum};
pub use ethernet::{EtherType, EthernetFrame};
pub use frame::{CapturedFrame, FrameLayer, TcpFlow};
pub use http::{HttpMessage, HttpRequest, HttpResponse};
pub use ip::{IpProtocol, Ipv4Packet};
pub use tcp::{TcpFlags, TcpPort, TcpSegment};
