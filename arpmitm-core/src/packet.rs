//! Raw frames as delivered by a capture source

use std::time::SystemTime;

/// A frame observed on the wire, before any layer is parsed
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// When the frame was captured
    pub timestamp: SystemTime,
    /// Interface the frame was received on
    pub interface: String,
    /// Frame bytes, starting at the Ethernet header
    pub data: Vec<u8>,
    /// Length on the wire (may exceed `data.len()` when the snaplen truncated it)
    pub wire_len: usize,
}

impl RawFrame {
    pub fn new(interface: impl Into<String>, data: Vec<u8>) -> Self {
        let wire_len = data.len();
        Self {
            timestamp: SystemTime::now(),
            interface: interface.into(),
            data,
            wire_len,
        }
    }

    /// Record the original length of a truncated capture
    pub fn with_wire_len(mut self, wire_len: usize) -> Self {
        self.wire_len = wire_len.max(self.data.len());
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The snaplen cut part of the frame off
    pub fn is_truncated(&self) -> bool {
        self.wire_len > self.data.len()
    }
}
