//! Address Resolver: IP to MAC via a broadcast ARP request

use crate::link::Link;
use arpmitm_core::{MacAddr, Session};
use arpmitm_packet::ArpPacket;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Resolves IPv4 addresses on the link's segment
#[derive(Clone)]
pub struct Resolver {
    link: Arc<dyn Link>,
    timeout: Duration,
    session: Option<Arc<Session>>,
}

impl Resolver {
    pub fn new(link: Arc<dyn Link>, timeout: Duration) -> Self {
        Self {
            link,
            timeout,
            session: None,
        }
    }

    /// Count sends and failures against `session`
    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask who has `ip` and wait for the first reply.
    ///
    /// Returns `None` when nothing answers before the timeout or the
    /// request cannot be sent. Never fails: an unresolved address is an
    /// ordinary outcome for callers.
    pub async fn resolve(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        let our_mac = self.link.mac();
        let our_ip = self.link.ipv4().unwrap_or(Ipv4Addr::UNSPECIFIED);

        let request = ArpPacket::new_request(our_mac, our_ip, ip);
        let frame = match request.to_frame(our_mac, MacAddr::broadcast()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(ip = %ip, error = %e, "Failed to build ARP request");
                return None;
            }
        };

        if let Err(e) = self.link.send(&frame).await {
            warn!(ip = %ip, interface = %self.link.name(), error = %e, "Failed to send ARP request");
            if let Some(session) = &self.session {
                session.counters().increment_send_errors();
            }
            return None;
        }
        if let Some(session) = &self.session {
            session.counters().record_transmit(frame.len());
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match self.link.recv(remaining).await {
                Ok(Some(data)) => {
                    if let Some(reply) = ArpPacket::from_frame(&data) {
                        if reply.is_reply() && reply.sender_proto_addr == ip {
                            debug!(ip = %ip, mac = %reply.sender_hw_addr, "Resolved");
                            return Some(reply.sender_hw_addr);
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(ip = %ip, error = %e, "Receive failed while resolving");
                    break;
                }
            }
        }

        debug!(ip = %ip, timeout = ?self.timeout, "No ARP reply");
        if let Some(session) = &self.session {
            session.counters().increment_resolve_failures();
        }
        None
    }
}
