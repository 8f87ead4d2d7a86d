//! Packet capture for arpmitm
//!
//! A thin, type-safe wrapper around pcap for the sniffing half of the
//! engine:
//!
//! - **Interface Management**: list, query and pick network interfaces
//! - **Frame Sources**: live pcap handles behind the [`FrameSource`] trait,
//!   so the capture loop can be driven by anything that yields frames
//! - **BPF Filters**: helpers for ARP, HTTP and target/gateway traffic
//! - **Statistics**: frame, byte, drop and per-layer counters
//!
//! ## Example
//!
//! ```no_run
//! use arpmitm_capture::{filters, PacketCapture};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut capture = PacketCapture::new("eth0")?;
//! capture.set_filter(&filters::http_filter());
//!
//! let mut source = capture.open()?;
//! capture.run(&mut source, |frame| {
//!     println!("Got frame: {} bytes", frame.len());
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod filters;
pub mod interface;
pub mod stats;

// Re-export main types
pub use capture::{CaptureConfig, CaptureState, FrameSource, PacketCapture, PcapSource};
pub use interface::{default_interface, get_interface, list_interfaces, InterfaceInfo};
pub use stats::{CaptureStats, StatsAccumulator};
