//! Shared state for one poisoning run
//!
//! A [`Session`] is created per run and handed (behind an `Arc`) to the
//! poison scheduler, the capture task and any reporting code. It owns the
//! cancellation flag, the scheduler state and every counter, so nothing in
//! the engine needs process-wide globals.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::sync::Notify;
use uuid::Uuid;

/// Lifecycle of the poison scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoisonState {
    /// Created, not yet looping
    Idle,
    /// Sending spoofed replies every interval
    Active,
    /// Cancellation observed, finishing the current round
    Stopping,
    /// Restoration done, nothing more will be sent
    Terminated,
}

impl fmt::Display for PoisonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoisonState::Idle => "idle",
            PoisonState::Active => "active",
            PoisonState::Stopping => "stopping",
            PoisonState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Thread-safe session counters
#[derive(Debug, Default)]
pub struct SessionCounters {
    /// Operator-facing counter: +2 per completed poison round
    pub packets_sent: AtomicU64,
    /// Frames actually handed to the link
    pub frames_transmitted: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub resolve_failures: AtomicU64,
    pub send_errors: AtomicU64,
    /// Corrective replies sent during restoration
    pub restore_frames: AtomicU64,
    pub restore_attempts: AtomicU64,
}

impl SessionCounters {
    /// Count one finished poison round (one spoof toward each side).
    ///
    /// Returns the counter value after the increment.
    pub fn record_poison_round(&self) -> u64 {
        self.packets_sent.fetch_add(2, Ordering::SeqCst) + 2
    }

    pub fn record_transmit(&self, bytes: usize) {
        self.frames_transmitted.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn increment_resolve_failures(&self) {
        self.resolve_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_send_errors(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_restore_frames(&self, frames: u64) {
        self.restore_frames.fetch_add(frames, Ordering::Relaxed);
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::SeqCst)
    }
}

/// Point-in-time copy of a session's counters
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub id: Uuid,
    pub state: PoisonState,
    pub packets_sent: u64,
    pub frames_transmitted: u64,
    pub bytes_sent: u64,
    pub resolve_failures: u64,
    pub send_errors: u64,
    pub restore_frames: u64,
    pub restore_attempts: u64,
    pub started_at: SystemTime,
    /// Seconds since start, set once the session stopped running
    pub duration_secs: Option<u64>,
}

/// One poisoning run
pub struct Session {
    id: Uuid,
    running: AtomicBool,
    state: RwLock<PoisonState>,
    cancel: Notify,
    restored: AtomicBool,
    counters: SessionCounters,
    started_at: SystemTime,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            running: AtomicBool::new(true),
            state: RwLock::new(PoisonState::Idle),
            cancel: Notify::new(),
            restored: AtomicBool::new(false),
            counters: SessionCounters::default(),
            started_at: SystemTime::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// False once [`Session::cancel`] has been called
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request a cooperative stop and wake every task waiting on
    /// [`Session::cancelled`].
    pub fn cancel(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.cancel.notify_waiters();
        }
    }

    /// Resolves once the session has been cancelled
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel() is not missed.
            let notified = self.cancel.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }

    pub fn state(&self) -> PoisonState {
        *self.state.read()
    }

    pub fn set_state(&self, state: PoisonState) {
        *self.state.write() = state;
    }

    /// Claim the single restoration slot of this session.
    ///
    /// Returns `true` exactly once; later callers get `false`.
    pub fn begin_restore(&self) -> bool {
        let first = self
            .restored
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if first {
            self.counters.restore_attempts.fetch_add(1, Ordering::SeqCst);
        }
        first
    }

    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    pub fn packets_sent(&self) -> u64 {
        self.counters.packets_sent()
    }

    pub fn stats(&self) -> SessionStats {
        let running = self.is_running();
        let duration_secs = if !running {
            SystemTime::now()
                .duration_since(self.started_at)
                .ok()
                .map(|d| d.as_secs())
        } else {
            None
        };

        let c = &self.counters;
        SessionStats {
            id: self.id,
            state: self.state(),
            packets_sent: c.packets_sent.load(Ordering::SeqCst),
            frames_transmitted: c.frames_transmitted.load(Ordering::Relaxed),
            bytes_sent: c.bytes_sent.load(Ordering::Relaxed),
            resolve_failures: c.resolve_failures.load(Ordering::Relaxed),
            send_errors: c.send_errors.load(Ordering::Relaxed),
            restore_frames: c.restore_frames.load(Ordering::Relaxed),
            restore_attempts: c.restore_attempts.load(Ordering::SeqCst),
            started_at: self.started_at,
            duration_secs,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("running", &self.is_running())
            .field("state", &self.state())
            .field("packets_sent", &self.packets_sent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_poison_round_counts_two() {
        let session = Session::new();
        for n in 1..=5 {
            assert_eq!(session.counters().record_poison_round(), 2 * n);
        }
        assert_eq!(session.packets_sent(), 10);
    }

    #[test]
    fn test_restore_latch() {
        let session = Session::new();
        assert!(session.begin_restore());
        assert!(!session.begin_restore());
        assert!(!session.begin_restore());
        assert_eq!(session.stats().restore_attempts, 1);
    }

    #[test]
    fn test_stats_snapshot() {
        let session = Session::new();
        session.counters().record_transmit(60);
        session.counters().record_transmit(60);
        session.counters().increment_send_errors();
        session.set_state(PoisonState::Active);

        let stats = session.stats();
        assert_eq!(stats.frames_transmitted, 2);
        assert_eq!(stats.bytes_sent, 120);
        assert_eq!(stats.send_errors, 1);
        assert_eq!(stats.state, PoisonState::Active);
        assert!(stats.duration_secs.is_none());

        session.cancel();
        assert!(session.stats().duration_secs.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let session = Arc::new(Session::new());
        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        session.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake on cancel")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_after_cancel_returns_immediately() {
        let session = Session::new();
        session.cancel();
        session.cancel();
        tokio::time::timeout(Duration::from_millis(100), session.cancelled())
            .await
            .expect("already cancelled");
        assert!(!session.is_running());
    }
}
