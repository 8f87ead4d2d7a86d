//! ARP sweep of a local subnet

use crate::link::Link;
use arpmitm_core::{Error, MacAddr, NetworkAddress, Result};
use arpmitm_packet::ArpPacket;
use ipnetwork::Ipv4Network;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How long replies are collected after the last request
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Smallest prefix accepted, to keep a sweep to at most 65534 requests
pub const MIN_SCAN_PREFIX: u8 = 16;

pub struct HostScanner {
    link: Arc<dyn Link>,
    timeout: Duration,
}

impl HostScanner {
    pub fn new(link: Arc<dyn Link>) -> Self {
        Self {
            link,
            timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Addresses in `network` that a request should go to
    fn candidates(&self, network: Ipv4Network) -> Vec<Ipv4Addr> {
        let own = self.link.ipv4();
        let edges = network.prefix() < 31;

        network
            .iter()
            .filter(|ip| !(edges && (*ip == network.network() || *ip == network.broadcast())))
            .filter(|ip| Some(*ip) != own)
            .collect()
    }

    /// Broadcast a request for every host in `network` and collect the answers.
    ///
    /// Hosts are returned sorted by address, each reported once.
    pub async fn scan(&self, network: Ipv4Network) -> Result<Vec<NetworkAddress>> {
        if network.prefix() < MIN_SCAN_PREFIX {
            return Err(Error::invalid_parameter(
                "range",
                format!("/{} is too large, use /{} or longer", network.prefix(), MIN_SCAN_PREFIX),
            ));
        }

        let candidates = self.candidates(network);
        let our_mac = self.link.mac();
        let our_ip = self.link.ipv4().unwrap_or(Ipv4Addr::UNSPECIFIED);
        info!(network = %network, hosts = candidates.len(), interface = %self.link.name(), "Scanning");

        let mut failures = 0usize;
        for ip in &candidates {
            let request = ArpPacket::new_request(our_mac, our_ip, *ip);
            let frame = request.to_frame(our_mac, MacAddr::broadcast())?;
            if let Err(e) = self.link.send(&frame).await {
                debug!(ip = %ip, error = %e, "Request not sent");
                failures += 1;
            }
        }
        if !candidates.is_empty() && failures == candidates.len() {
            return Err(Error::transmit(format!(
                "no ARP request could be sent on {}",
                self.link.name()
            )));
        }
        if failures > 0 {
            warn!(failures, "Some ARP requests were not sent");
        }

        let mut found = BTreeMap::new();
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Some(data) = self.link.recv(remaining).await? else {
                break;
            };
            let Some(reply) = ArpPacket::from_frame(&data) else {
                continue;
            };
            if reply.is_reply()
                && network.contains(reply.sender_proto_addr)
                && found
                    .insert(reply.sender_proto_addr, reply.sender_hw_addr)
                    .is_none()
            {
                debug!(ip = %reply.sender_proto_addr, mac = %reply.sender_hw_addr, "Host up");
            }
        }

        info!(network = %network, found = found.len(), "Scan complete");
        Ok(found
            .into_iter()
            .map(|(ip, mac)| NetworkAddress::resolved(ip, mac))
            .collect())
    }
}
