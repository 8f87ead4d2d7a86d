//! Restorer: undo the poisoning
//!
//! Both hosts are resolved again (never from a cache) and each peer is sent
//! corrective replies carrying the other side's true hardware address. A
//! side that cannot be resolved is skipped; the other side is still
//! corrected.

use crate::link::Link;
use crate::resolver::Resolver;
use arpmitm_core::{MacAddr, Session};
use arpmitm_packet::ArpPacket;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What was done to repair one side's binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideReport {
    pub ip: Ipv4Addr,
    /// True address found during restoration
    pub mac: Option<MacAddr>,
    pub frames_sent: usize,
    pub send_failures: usize,
}

impl SideReport {
    fn new(ip: Ipv4Addr, mac: Option<MacAddr>) -> Self {
        Self {
            ip,
            mac,
            frames_sent: 0,
            send_failures: 0,
        }
    }

    pub fn is_restored(&self) -> bool {
        self.frames_sent > 0
    }
}

impl fmt::Display for SideReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mac {
            Some(mac) => write!(f, "{} at {} ({} frames)", self.ip, mac, self.frames_sent),
            None => write!(f, "{} unresolved", self.ip),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// The target's binding, as corrected in the gateway's cache
    pub target: SideReport,
    /// The gateway's binding, as corrected in the target's cache
    pub gateway: SideReport,
}

impl RestoreReport {
    pub fn frames_sent(&self) -> usize {
        self.target.frames_sent + self.gateway.frames_sent
    }

    pub fn is_complete(&self) -> bool {
        self.target.is_restored() && self.gateway.is_restored()
    }
}

pub struct Restorer {
    link: Arc<dyn Link>,
    resolver: Resolver,
    session: Arc<Session>,
    count: usize,
    interval: Duration,
}

impl Restorer {
    pub fn new(
        link: Arc<dyn Link>,
        resolver: Resolver,
        session: Arc<Session>,
        count: usize,
        interval: Duration,
    ) -> Self {
        Self {
            link,
            resolver,
            session,
            count,
            interval,
        }
    }

    /// Send `count` corrective replies per side, `interval` apart
    pub async fn restore(&self, target_ip: Ipv4Addr, gateway_ip: Ipv4Addr) -> RestoreReport {
        info!(target_ip = %target_ip, gateway_ip = %gateway_ip, "Restoring network");

        let target_mac = self.resolver.resolve(target_ip).await;
        let gateway_mac = self.resolver.resolve(gateway_ip).await;

        let mut target = SideReport::new(target_ip, target_mac);
        let mut gateway = SideReport::new(gateway_ip, gateway_mac);
        if target_mac.is_none() {
            warn!(ip = %target_ip, "Target unresolved, its binding cannot be restored");
        }
        if gateway_mac.is_none() {
            warn!(ip = %gateway_ip, "Gateway unresolved, its binding cannot be restored");
        }

        for round in 0..self.count {
            if round > 0 && !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
            self.correct(&mut target, gateway_ip, gateway_mac).await;
            self.correct(&mut gateway, target_ip, target_mac).await;
        }

        let report = RestoreReport { target, gateway };
        self.session
            .counters()
            .add_restore_frames(report.frames_sent() as u64);
        info!(
            frames = report.frames_sent(),
            target = %report.target,
            gateway = %report.gateway,
            "Restoration finished"
        );
        report
    }

    /// Tell `peer_ip` that `side.ip` is at `side.mac`.
    ///
    /// Broadcast when the peer itself is unresolved.
    async fn correct(&self, side: &mut SideReport, peer_ip: Ipv4Addr, peer_mac: Option<MacAddr>) {
        let Some(true_mac) = side.mac else {
            return;
        };

        let destination = peer_mac.unwrap_or(MacAddr::broadcast());
        let reply = ArpPacket::new_reply(true_mac, side.ip, destination, peer_ip);
        let frame = match reply.to_frame(self.link.mac(), destination) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(ip = %side.ip, error = %e, "Failed to build corrective reply");
                side.send_failures += 1;
                return;
            }
        };

        match self.link.send(&frame).await {
            Ok(()) => {
                side.frames_sent += 1;
                self.session.counters().record_transmit(frame.len());
            }
            Err(e) => {
                warn!(ip = %side.ip, error = %e, "Failed to send corrective reply");
                side.send_failures += 1;
                self.session.counters().increment_send_errors();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{gateway_ip, target_ip, MockLink, GATEWAY_MAC, OPERATOR_MAC, TARGET_MAC};

    fn restorer(link: &Arc<MockLink>, count: usize) -> (Restorer, Arc<Session>) {
        let session = Arc::new(Session::new());
        let resolver =
            Resolver::new(link.clone(), Duration::from_millis(50)).with_session(session.clone());
        let restorer = Restorer::new(link.clone(), resolver, session.clone(), count, Duration::ZERO);
        (restorer, session)
    }

    #[tokio::test]
    async fn test_four_frames_per_side() {
        let link = Arc::new(MockLink::lan());
        let (restorer, session) = restorer(&link, 4);

        let report = restorer.restore(target_ip(), gateway_ip()).await;
        assert!(report.is_complete());
        assert_eq!(report.target.frames_sent, 4);
        assert_eq!(report.gateway.frames_sent, 4);
        assert_eq!(session.stats().restore_frames, 8);

        let replies = link.sent_replies();
        assert_eq!(replies.len(), 8);

        // Gateway learns the target's true address
        let to_gateway: Vec<_> = replies
            .iter()
            .filter(|(dst, _)| *dst == GATEWAY_MAC)
            .collect();
        assert_eq!(to_gateway.len(), 4);
        for (_, reply) in to_gateway {
            assert_eq!(reply.sender_proto_addr, target_ip());
            assert_eq!(reply.sender_hw_addr, TARGET_MAC);
            assert_eq!(reply.target_proto_addr, gateway_ip());
        }

        // And the target learns the gateway's
        let to_target: Vec<_> = replies
            .iter()
            .filter(|(dst, _)| *dst == TARGET_MAC)
            .collect();
        assert_eq!(to_target.len(), 4);
        for (_, reply) in to_target {
            assert_eq!(reply.sender_proto_addr, gateway_ip());
            assert_eq!(reply.sender_hw_addr, GATEWAY_MAC);
            assert_ne!(reply.sender_hw_addr, OPERATOR_MAC);
        }
    }

    #[tokio::test]
    async fn test_uses_freshly_resolved_addresses() {
        let link = Arc::new(MockLink::lan());
        let (restorer, _) = restorer(&link, 2);

        // The gateway's NIC changed since poisoning started
        let replaced = MacAddr::new([0x02, 0, 0, 0, 0, 0xaa]);
        link.set_host(gateway_ip(), replaced);

        let report = restorer.restore(target_ip(), gateway_ip()).await;
        assert_eq!(report.gateway.mac, Some(replaced));
        assert!(link
            .sent_replies()
            .iter()
            .filter(|(_, reply)| reply.sender_proto_addr == gateway_ip())
            .all(|(_, reply)| reply.sender_hw_addr == replaced));
    }

    #[tokio::test]
    async fn test_unresolved_side_skipped() {
        let link = Arc::new(MockLink::lan());
        link.remove_host(gateway_ip());
        let (restorer, _) = restorer(&link, 4);

        let report = restorer.restore(target_ip(), gateway_ip()).await;
        assert!(!report.is_complete());
        assert_eq!(report.gateway.frames_sent, 0);
        assert_eq!(report.target.frames_sent, 4);

        // With no gateway address the target's binding goes out as broadcast
        let replies = link.sent_replies();
        assert_eq!(replies.len(), 4);
        assert!(replies.iter().all(|(dst, reply)| dst.is_broadcast()
            && reply.sender_proto_addr == target_ip()
            && reply.sender_hw_addr == TARGET_MAC));
    }

    #[tokio::test]
    async fn test_send_failures_counted() {
        let link = Arc::new(MockLink::lan());
        link.set_fail_replies(true);
        let (restorer, session) = restorer(&link, 3);

        let report = restorer.restore(target_ip(), gateway_ip()).await;
        assert_eq!(report.frames_sent(), 0);
        assert_eq!(report.target.send_failures, 3);
        assert_eq!(report.gateway.send_failures, 3);
        assert_eq!(session.stats().send_errors, 6);
    }
}
