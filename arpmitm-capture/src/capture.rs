//! Packet capture wrapper around pcap
//!
//! [`PacketCapture`] owns configuration, state and statistics. The frames
//! themselves come from a [`FrameSource`], normally a [`PcapSource`] opened
//! with [`PacketCapture::open`]. [`PacketCapture::run`] blocks the calling
//! thread and is interrupted cooperatively by [`PacketCapture::stop`].

use arpmitm_core::{Error, RawFrame, Result};
use parking_lot::RwLock;
use pcap::{Active, Capture, Device};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::interface::{get_interface, InterfaceInfo};
use crate::stats::{CaptureStats, StatsAccumulator};

/// Default snapshot length (maximum bytes per packet)
const DEFAULT_SNAPLEN: i32 = 65535;

/// Default read timeout, also the worst-case latency of `stop()`
const DEFAULT_TIMEOUT_MS: i32 = 1000;

/// Configuration for packet capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum bytes to capture per packet
    pub snaplen: i32,
    /// Read timeout in milliseconds
    pub timeout_ms: i32,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Buffer size (0 = default)
    pub buffer_size: i32,
    /// Enable immediate mode (deliver packets immediately)
    pub immediate_mode: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: true,
            buffer_size: 0,
            immediate_mode: true,
        }
    }
}

impl CaptureConfig {
    pub fn with_snaplen(mut self, snaplen: i32) -> Self {
        self.snaplen = snaplen;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: i32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_promiscuous(mut self, promiscuous: bool) -> Self {
        self.promiscuous = promiscuous;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: i32) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

/// State of packet capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Created, `run` not called yet
    Idle,
    /// `run` is delivering frames
    Running,
    /// Stopped; `run` returns (or will return) immediately
    Stopped,
}

/// Where captured frames come from
pub trait FrameSource: Send {
    /// Next frame, or `Ok(None)` when the read timed out with nothing to
    /// deliver.
    fn next_frame(&mut self) -> Result<Option<RawFrame>>;

    /// Running total of frames the kernel dropped, if the source knows it
    fn dropped(&mut self) -> Option<u64> {
        None
    }
}

/// Live pcap capture handle
pub struct PcapSource {
    interface: String,
    capture: Capture<Active>,
}

impl FrameSource for PcapSource {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        match self.capture.next_packet() {
            Ok(packet) => {
                let frame = RawFrame::new(self.interface.as_str(), packet.data.to_vec())
                    .with_wire_len(packet.header.len as usize);
                Ok(Some(frame))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(Error::Capture(format!("{}: {}", self.interface, e))),
        }
    }

    fn dropped(&mut self) -> Option<u64> {
        self.capture.stats().ok().map(|stats| stats.dropped as u64)
    }
}

/// Main packet capture interface
pub struct PacketCapture {
    interface_info: InterfaceInfo,
    config: CaptureConfig,
    /// BPF filter applied when the source is opened
    filter: Option<String>,
    state: Arc<RwLock<CaptureState>>,
    stats: StatsAccumulator,
}

impl PacketCapture {
    /// Create a new packet capture on the specified interface
    pub fn new(interface: &str) -> Result<Self> {
        Self::with_config(interface, CaptureConfig::default())
    }

    /// Create a new packet capture with custom configuration
    pub fn with_config(interface: &str, config: CaptureConfig) -> Result<Self> {
        let interface_info = get_interface(interface)?;

        if !interface_info.is_up {
            return Err(Error::Capture(format!("Interface '{}' is not up", interface)));
        }

        info!(interface = %interface, "Created packet capture");
        Ok(Self::with_info(interface_info, config))
    }

    /// Build a capture around already-known interface information
    pub fn with_info(interface_info: InterfaceInfo, config: CaptureConfig) -> Self {
        Self {
            interface_info,
            config,
            filter: None,
            state: Arc::new(RwLock::new(CaptureState::Idle)),
            stats: StatsAccumulator::new(),
        }
    }

    /// Set the BPF filter used by the next [`PacketCapture::open`].
    ///
    /// The expression is compiled by libpcap when the source is opened; an
    /// empty string clears the filter.
    pub fn set_filter(&mut self, bpf: &str) {
        let bpf = bpf.trim();
        self.filter = (!bpf.is_empty()).then(|| bpf.to_string());
        debug!(filter = ?self.filter, "BPF filter set");
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn interface(&self) -> &str {
        &self.interface_info.name
    }

    /// Get interface information
    pub fn interface_info(&self) -> &InterfaceInfo {
        &self.interface_info
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Get current capture state
    pub fn state(&self) -> CaptureState {
        *self.state.read()
    }

    /// Check if capture is running
    pub fn is_running(&self) -> bool {
        self.state() == CaptureState::Running
    }

    /// Get current statistics
    pub fn stats(&self) -> CaptureStats {
        self.stats.snapshot()
    }

    /// Shared handle to the counters, for recording per-layer statistics
    /// from the frame handler
    pub fn stats_handle(&self) -> StatsAccumulator {
        self.stats.clone()
    }

    /// Open a live pcap source on the interface
    pub fn open(&self) -> Result<PcapSource> {
        let interface = self.interface();
        debug!(interface = %interface, "Initializing pcap capture");

        let device = Device::from(interface);
        let mut capture = Capture::from_device(device)
            .map_err(|e| Error::Capture(format!("Failed to create capture: {}", e)))?
            .promisc(self.config.promiscuous)
            .snaplen(self.config.snaplen)
            .timeout(self.config.timeout_ms)
            .immediate_mode(self.config.immediate_mode);

        if self.config.buffer_size > 0 {
            capture = capture.buffer_size(self.config.buffer_size);
        }

        let mut capture = capture.open().map_err(|e| match e {
            pcap::Error::PcapError(ref msg) if msg.contains("ermission") => {
                Error::InsufficientPrivileges(format!("capture on {}: {}", interface, msg))
            }
            e => Error::Capture(format!("Failed to open capture: {}", e)),
        })?;

        if let Some(filter) = &self.filter {
            capture
                .filter(filter, true)
                .map_err(|e| Error::Capture(format!("Invalid BPF filter '{}': {}", filter, e)))?;
            debug!(filter = %filter, "Applied filter");
        }

        info!(interface = %interface, "Capture initialized");
        Ok(PcapSource {
            interface: interface.to_string(),
            capture,
        })
    }

    /// Deliver every frame from `source` to `callback` until stopped.
    ///
    /// Blocks the calling thread. The stop state is checked before every
    /// read, so a source with a read timeout bounds how long `stop()` takes
    /// to be noticed. A source error ends the loop with `Error::Capture`.
    pub fn run<F>(&self, source: &mut dyn FrameSource, mut callback: F) -> Result<()>
    where
        F: FnMut(RawFrame),
    {
        {
            let mut state = self.state.write();
            match *state {
                CaptureState::Running => {
                    return Err(Error::Capture("Capture already running".to_string()))
                }
                CaptureState::Stopped => {
                    debug!(interface = %self.interface(), "Capture stopped before it started");
                    return Ok(());
                }
                CaptureState::Idle => *state = CaptureState::Running,
            }
        }

        info!(interface = %self.interface(), "Starting packet capture");

        let result = loop {
            if self.state() != CaptureState::Running {
                break Ok(());
            }

            match source.next_frame() {
                Ok(Some(frame)) => {
                    self.stats.record_frame(frame.len());
                    callback(frame);
                }
                Ok(None) => continue,
                Err(e) => {
                    error!(interface = %self.interface(), error = %e, "Packet capture error");
                    break Err(match e {
                        Error::Capture(_) => e,
                        other => Error::Capture(other.to_string()),
                    });
                }
            }
        };

        if let Some(dropped) = source.dropped() {
            if dropped > 0 {
                warn!(interface = %self.interface(), dropped, "Kernel dropped frames");
            }
            self.stats.set_drops(dropped);
        }

        *self.state.write() = CaptureState::Stopped;
        info!(interface = %self.interface(), "Capture finished");
        result
    }

    /// Ask a running (or not yet started) capture to stop
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *self.state.write(), CaptureState::Stopped);
        if previous != CaptureState::Stopped {
            info!(interface = %self.interface(), "Stopping packet capture");
        }
    }
}
