//! Example: Building and classifying frames
//!
//! Builds the two kinds of frame arpmitm deals in, a forged ARP reply and
//! an HTTP request, then runs them back through the classifier.

use arpmitm_core::{MacAddr, RawFrame};
use arpmitm_packet::{ArpPacket, CapturedFrame, EtherType, FrameLayer, PacketBuilder, TcpFlags};
use std::net::Ipv4Addr;

fn main() {
    let operator = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
    let victim = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x14]);
    let victim_ip = Ipv4Addr::new(192, 168, 1, 20);
    let gateway_ip = Ipv4Addr::new(192, 168, 1, 1);

    // "192.168.1.1 is at 02:00:00:00:00:01", sent to the victim
    let reply = ArpPacket::new_reply(operator, gateway_ip, victim, victim_ip);
    let arp_frame = reply
        .to_frame(operator, victim)
        .expect("Failed to build ARP reply");
    println!("ARP reply: {} bytes", arp_frame.len());

    let http_frame = PacketBuilder::new()
        .ethernet(victim, operator, EtherType::IPv4)
        .ipv4(victim_ip, Ipv4Addr::new(93, 184, 216, 34))
        .ttl(64)
        .tcp(51000, 80, 1000, 1, TcpFlags::PSH_ACK)
        .payload(b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n".to_vec())
        .build()
        .expect("Failed to build HTTP request");
    println!("HTTP request: {} bytes", http_frame.len());

    for data in [arp_frame, http_frame] {
        let frame = CapturedFrame::parse(RawFrame::new("demo0", data));
        match &frame.layer {
            FrameLayer::Arp(arp) => println!(
                "  arp: {} is at {}",
                arp.sender_proto_addr, arp.sender_hw_addr
            ),
            FrameLayer::HttpRequest(req) => println!("  http: {}", req),
            other => println!("  {}", other.name()),
        }
        if let Some(flow) = frame.flow {
            println!("  flow: {}", flow);
        }
    }
}
