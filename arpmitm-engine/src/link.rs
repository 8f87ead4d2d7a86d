//! Raw link-layer I/O
//!
//! Every engine component talks to the network through [`Link`]. The live
//! implementation is [`DatalinkLink`], one persistent pnet Ethernet channel
//! per interface.

use arpmitm_core::{Error, Interface, MacAddr, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use pnet_datalink::{DataLinkReceiver, DataLinkSender};
use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Send and receive whole Ethernet frames on one interface
#[async_trait]
pub trait Link: Send + Sync {
    /// Interface name, for logging
    fn name(&self) -> &str;

    /// Hardware address of the operator's interface
    fn mac(&self) -> MacAddr;

    /// IPv4 address of the operator's interface, if it has one
    fn ipv4(&self) -> Option<Ipv4Addr>;

    /// Transmit one frame
    async fn send(&self, frame: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for the next inbound frame
    async fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>>;
}

/// [`Link`] over a persistent pnet datalink channel
pub struct DatalinkLink {
    interface: Interface,
    tx: Arc<Mutex<Box<dyn DataLinkSender>>>,
    rx: Arc<Mutex<Box<dyn DataLinkReceiver>>>,
}

impl DatalinkLink {
    /// Granularity of the blocking reads in [`Link::recv`]
    pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

    /// Open an Ethernet channel on `interface`
    pub fn open(interface: Interface) -> Result<Self> {
        let (tx, rx) = interface.open_channel(Self::READ_TIMEOUT)?;
        debug!(interface = %interface, "Opened datalink channel");

        Ok(Self {
            interface,
            tx: Arc::new(Mutex::new(tx)),
            rx: Arc::new(Mutex::new(rx)),
        })
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }
}

#[async_trait]
impl Link for DatalinkLink {
    fn name(&self) -> &str {
        &self.interface.name
    }

    fn mac(&self) -> MacAddr {
        self.interface.mac_address
    }

    fn ipv4(&self) -> Option<Ipv4Addr> {
        self.interface.ipv4
    }

    async fn send(&self, frame: &[u8]) -> Result<()> {
        let mut tx = self.tx.lock();
        tx.send_to(frame, None)
            .ok_or_else(|| Error::transmit("Failed to send packet: no buffer space"))?
            .map_err(|e| Error::transmit(format!("Send error on {}: {}", self.interface.name, e)))?;
        trace!(interface = %self.interface.name, len = frame.len(), "Frame sent");
        Ok(())
    }

    async fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let rx = self.rx.clone();
        let deadline = Instant::now() + timeout;

        // pnet receivers block, so read on the blocking pool
        tokio::task::spawn_blocking(move || {
            let mut rx = rx.lock();
            loop {
                match rx.next() {
                    Ok(frame) => return Ok(Some(frame.to_vec())),
                    Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                        if Instant::now() >= deadline {
                            return Ok(None);
                        }
                    }
                    Err(e) => return Err(Error::Io(e)),
                }
            }
        })
        .await
        .map_err(|e| Error::ExecutionFailed(format!("Receive task failed: {}", e)))?
    }
}
