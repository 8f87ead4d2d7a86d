//! In-memory collaborators for engine tests

use crate::forwarding::ForwardingControl;
use crate::link::Link;
use arpmitm_capture::FrameSource;
use arpmitm_core::{Error, MacAddr, RawFrame, Result};
use arpmitm_packet::{ArpPacket, EthernetFrame};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

pub const OPERATOR_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
pub const TARGET_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x14]);
pub const GATEWAY_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0xfe]);

pub fn operator_ip() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, 50)
}

pub fn target_ip() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, 20)
}

pub fn gateway_ip() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, 1)
}

/// A segment where every host in the table answers ARP requests instantly
pub struct MockLink {
    hosts: Mutex<HashMap<Ipv4Addr, MacAddr>>,
    sent: Mutex<Vec<Vec<u8>>>,
    fail_sends: AtomicBool,
    fail_replies: AtomicBool,
    inbox_tx: mpsc::UnboundedSender<Vec<u8>>,
    inbox_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MockLink {
    pub fn new() -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            hosts: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            fail_replies: AtomicBool::new(false),
            inbox_tx,
            inbox_rx: tokio::sync::Mutex::new(inbox_rx),
        }
    }

    /// Target and gateway both online
    pub fn lan() -> Self {
        let link = Self::new();
        link.set_host(target_ip(), TARGET_MAC);
        link.set_host(gateway_ip(), GATEWAY_MAC);
        link
    }

    pub fn set_host(&self, ip: Ipv4Addr, mac: MacAddr) {
        self.hosts.lock().insert(ip, mac);
    }

    pub fn remove_host(&self, ip: Ipv4Addr) {
        self.hosts.lock().remove(&ip);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Refuse ARP replies but keep sending requests
    pub fn set_fail_replies(&self, fail: bool) {
        self.fail_replies.store(fail, Ordering::SeqCst);
    }

    /// Queue an arbitrary inbound frame
    pub fn inject(&self, frame: Vec<u8>) {
        let _ = self.inbox_tx.send(frame);
    }

    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// Every ARP packet sent, with its Ethernet destination
    pub fn sent_arp(&self) -> Vec<(MacAddr, ArpPacket)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|frame| {
                let eth = EthernetFrame::from_bytes(frame)?;
                let arp = ArpPacket::from_frame(frame)?;
                Some((eth.destination, arp))
            })
            .collect()
    }

    pub fn sent_replies(&self) -> Vec<(MacAddr, ArpPacket)> {
        self.sent_arp()
            .into_iter()
            .filter(|(_, arp)| arp.is_reply())
            .collect()
    }

    pub fn sent_requests(&self) -> Vec<ArpPacket> {
        self.sent_arp()
            .into_iter()
            .map(|(_, arp)| arp)
            .filter(ArpPacket::is_request)
            .collect()
    }

    fn answer(&self, frame: &[u8]) {
        let Some(request) = ArpPacket::from_frame(frame) else {
            return;
        };
        if !request.is_request() {
            return;
        }

        let mac = self.hosts.lock().get(&request.target_proto_addr).copied();
        if let Some(mac) = mac {
            let reply = ArpPacket::new_reply(
                mac,
                request.target_proto_addr,
                request.sender_hw_addr,
                request.sender_proto_addr,
            );
            if let Ok(frame) = reply.to_frame(mac, request.sender_hw_addr) {
                self.inject(frame);
            }
        }
    }
}

#[async_trait]
impl Link for MockLink {
    fn name(&self) -> &str {
        "mock0"
    }

    fn mac(&self) -> MacAddr {
        OPERATOR_MAC
    }

    fn ipv4(&self) -> Option<Ipv4Addr> {
        Some(operator_ip())
    }

    async fn send(&self, frame: &[u8]) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::transmit("mock link refuses to send"));
        }
        if self.fail_replies.load(Ordering::SeqCst)
            && ArpPacket::from_frame(frame).map_or(false, |arp| arp.is_reply())
        {
            return Err(Error::transmit("mock link refuses replies"));
        }
        self.sent.lock().push(frame.to_vec());
        self.answer(frame);
        Ok(())
    }

    async fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let mut rx = self.inbox_rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(frame) => Ok(frame),
            Err(_) => Ok(None),
        }
    }
}

/// Records every forwarding toggle
#[derive(Default)]
pub struct MockForwarding {
    calls: Mutex<Vec<bool>>,
    fail_enable: bool,
}

impl MockForwarding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_enable: true,
        }
    }

    pub fn calls(&self) -> Vec<bool> {
        self.calls.lock().clone()
    }
}

impl ForwardingControl for MockForwarding {
    fn set_forwarding(&self, enabled: bool) -> Result<()> {
        self.calls.lock().push(enabled);
        if enabled && self.fail_enable {
            return Err(Error::Forwarding("read-only file system".into()));
        }
        Ok(())
    }
}

/// Frame source driven by a script.
///
/// Each step waits `delay` before yielding, which stands in for a blocking
/// pcap read. After the script runs out the source reports read timeouts.
pub struct ScriptedSource {
    steps: VecDeque<Result<Option<RawFrame>>>,
    delay: Duration,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            steps: frames
                .into_iter()
                .map(|data| Ok(Some(RawFrame::new("mock0", data))))
                .collect(),
            delay: Duration::from_millis(1),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn then_fail(mut self, message: &str) -> Self {
        self.steps.push_back(Err(Error::capture(message)));
        self
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        thread::sleep(self.delay);
        self.steps.pop_front().unwrap_or(Ok(None))
    }
}
