//! ARP cache poisoning engine for arpmitm
//!
//! This crate puts a host between a target and its gateway on the local
//! segment and keeps it there until told to stop. It includes:
//!
//! - `Resolver`: IP to MAC resolution over ARP
//! - `SpoofEmitter`: forged ARP replies
//! - `PoisonScheduler`: the periodic poisoning loop
//! - `ProtocolExtractor`: HTTP events from intercepted traffic
//! - `Restorer`: corrective replies that undo the poisoning
//! - `HostScanner`: ARP sweep of a subnet
//! - `MitmEngine`: the full session, from enabling forwarding to cleanup
//!
//! # Example
//!
//! ```no_run
//! use arpmitm_core::{EngineConfig, Interface};
//! use arpmitm_engine::{DatalinkLink, MitmEngine, ProcForwarding};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::new("eth0", "192.168.1.20".parse()?, "192.168.1.1".parse()?)
//!         .with_capture_http(false);
//!
//!     let link = Arc::new(DatalinkLink::open(Interface::by_name("eth0")?)?);
//!     let forwarding = Arc::new(ProcForwarding::new(&config.forward_path));
//!     let engine = MitmEngine::new(config, link, forwarding)?;
//!
//!     let report = engine
//!         .run(None, async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     println!("Sent packets: {}", report.session.packets_sent);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod extractor;
pub mod forwarding;
pub mod link;
pub mod resolver;
pub mod restore;
pub mod scan;
pub mod scheduler;
pub mod spoof;

#[cfg(test)]
mod mock;

pub use engine::{CaptureSetup, MitmEngine, RunReport};
pub use extractor::{HttpDirection, HttpEvent, ProtocolExtractor};
pub use forwarding::{ForwardingControl, ProcForwarding};
pub use link::{DatalinkLink, Link};
pub use resolver::Resolver;
pub use restore::{RestoreReport, Restorer, SideReport};
pub use scan::{HostScanner, DEFAULT_SCAN_TIMEOUT};
pub use scheduler::{PoisonRound, PoisonScheduler};
pub use spoof::{SpoofEmitter, SpoofOutcome};
