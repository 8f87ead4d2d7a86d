//! Classification of captured frames
//!
//! Every frame goes through [`CapturedFrame::parse`] exactly once and comes
//! out tagged with the highest layer that could be decoded. Frames that
//! fail to decode at any layer are simply `Unrecognized`.

use crate::arp::ArpPacket;
use crate::ethernet::{EtherType, EthernetFrame};
use crate::http::{HttpMessage, HttpRequest, HttpResponse};
use crate::ip::{IpProtocol, Ipv4Packet};
use crate::tcp::TcpSegment;
use arpmitm_core::RawFrame;
use std::fmt;
use std::net::SocketAddrV4;
use std::time::SystemTime;

/// Highest protocol layer decoded from a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLayer {
    Unrecognized,
    Arp(ArpPacket),
    HttpRequest(HttpRequest),
    HttpResponse(HttpResponse),
}

impl FrameLayer {
    /// Decode a full Ethernet frame
    pub fn classify(data: &[u8]) -> Self {
        Self::decode(data)
            .map(|(layer, _)| layer)
            .unwrap_or(FrameLayer::Unrecognized)
    }

    fn decode(data: &[u8]) -> Option<(Self, Option<TcpFlow>)> {
        let eth = EthernetFrame::from_bytes(data)?;

        match eth.ethertype {
            EtherType::ARP => {
                let arp = ArpPacket::parse(&eth.payload).ok()?;
                Some((FrameLayer::Arp(arp), None))
            }
            EtherType::IPv4 => {
                let ip = Ipv4Packet::from_bytes(&eth.payload)?;
                if ip.protocol != IpProtocol::TCP || ip.is_fragment() {
                    return None;
                }
                let tcp = TcpSegment::from_bytes(&ip.payload)?;
                let flow = TcpFlow {
                    source: SocketAddrV4::new(ip.source, tcp.source_port.to_u16()),
                    destination: SocketAddrV4::new(ip.destination, tcp.destination_port.to_u16()),
                };

                let layer = match HttpMessage::parse(&tcp.payload)? {
                    HttpMessage::Request(req) => FrameLayer::HttpRequest(req),
                    HttpMessage::Response(resp) => FrameLayer::HttpResponse(resp),
                };
                Some((layer, Some(flow)))
            }
            _ => None,
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self, FrameLayer::HttpRequest(_) | FrameLayer::HttpResponse(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            FrameLayer::Unrecognized => "unrecognized",
            FrameLayer::Arp(_) => "arp",
            FrameLayer::HttpRequest(_) => "http-request",
            FrameLayer::HttpResponse(_) => "http-response",
        }
    }
}

/// TCP endpoints of an HTTP frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpFlow {
    pub source: SocketAddrV4,
    pub destination: SocketAddrV4,
}

impl fmt::Display for TcpFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

/// A captured frame together with its decoded layer
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub timestamp: SystemTime,
    pub interface: String,
    pub data: Vec<u8>,
    pub layer: FrameLayer,
    /// Set for HTTP frames
    pub flow: Option<TcpFlow>,
}

impl CapturedFrame {
    /// Run the single parse step over a raw frame
    pub fn parse(raw: RawFrame) -> Self {
        let (layer, flow) = FrameLayer::decode(&raw.data).unwrap_or((FrameLayer::Unrecognized, None));

        CapturedFrame {
            timestamp: raw.timestamp,
            interface: raw.interface,
            data: raw.data,
            layer,
            flow,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PacketBuilder;
    use crate::tcp::TcpFlags;
    use arpmitm_core::MacAddr;
    use std::net::Ipv4Addr;

    const CLIENT_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x14]);
    const ROUTER_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x01]);

    fn tcp_frame(payload: &[u8]) -> Vec<u8> {
        PacketBuilder::new()
            .ethernet(CLIENT_MAC, ROUTER_MAC, EtherType::IPv4)
            .ipv4(Ipv4Addr::new(192, 168, 1, 20), Ipv4Addr::new(93, 184, 216, 34))
            .tcp(51000, 80, 1, 1, TcpFlags::PSH_ACK)
            .payload(payload.to_vec())
            .build()
            .unwrap()
    }

    #[test]
    fn test_http_request_frame() {
        let raw = RawFrame::new(
            "eth0",
            tcp_frame(b"POST /login HTTP/1.1\r\nHost: example.com\r\n\r\n"),
        );
        let frame = CapturedFrame::parse(raw);

        match &frame.layer {
            FrameLayer::HttpRequest(req) => {
                assert_eq!(req.method, "POST");
                assert_eq!(req.host(), Some("example.com"));
                assert_eq!(req.path, "/login");
            }
            other => panic!("unexpected layer {:?}", other),
        }

        let flow = frame.flow.unwrap();
        assert_eq!(flow.source.port(), 51000);
        assert_eq!(flow.destination.to_string(), "93.184.216.34:80");
    }

    #[test]
    fn test_padded_short_segment() {
        let data = tcp_frame(b"ab");
        assert_eq!(data.len(), EthernetFrame::MIN_FRAME_SIZE);

        let frame = CapturedFrame::parse(RawFrame::new("eth0", data));
        assert_eq!(frame.layer, FrameLayer::Unrecognized);
        assert!(frame.flow.is_none());
    }

    #[test]
    fn test_arp_frame() {
        let arp = ArpPacket::new_request(
            ROUTER_MAC,
            Ipv4Addr::new(192, 168, 1, 1),
            Ipv4Addr::new(192, 168, 1, 20),
        );
        let data = arp.to_frame(ROUTER_MAC, MacAddr::broadcast()).unwrap();

        assert_eq!(FrameLayer::classify(&data), FrameLayer::Arp(arp));
        assert_eq!(FrameLayer::classify(&data).name(), "arp");
    }

    #[test]
    fn test_garbage_is_unrecognized() {
        assert_eq!(FrameLayer::classify(&[]), FrameLayer::Unrecognized);
        assert_eq!(FrameLayer::classify(&[0xAB; 13]), FrameLayer::Unrecognized);

        // IPv4 ethertype with a truncated header
        let mut data = vec![0u8; 20];
        data[12] = 0x08;
        assert_eq!(FrameLayer::classify(&data), FrameLayer::Unrecognized);

        // Non-HTTP TCP payload
        let frame = tcp_frame(&[0x16, 0x03, 0x01, 0x00, 0xa5, 0x01, 0x00]);
        assert!(!FrameLayer::classify(&frame).is_http());
    }
}
