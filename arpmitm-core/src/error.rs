//! Error types for arpmitm

use std::net::Ipv4Addr;
use thiserror::Error;

/// Result type alias for arpmitm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for arpmitm
#[derive(Error, Debug)]
pub enum Error {
    /// Network I/O error
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol-specific error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No ARP reply arrived for the address before the timeout
    #[error("No ARP reply from {0}")]
    Unresolved(Ipv4Addr),

    /// A forged or corrective frame could not be transmitted
    #[error("Transmit error: {0}")]
    Transmit(String),

    /// Invalid parameter error
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Interface error
    #[error("Interface error: {0}")]
    Interface(String),

    /// Packet construction error
    #[error("Packet construction error: {0}")]
    PacketConstruction(String),

    /// Packet parsing error
    #[error("Packet parsing error: {0}")]
    PacketParsing(String),

    /// Capture error
    #[error("Packet capture error: {0}")]
    Capture(String),

    /// IP forwarding could not be toggled
    #[error("IP forwarding error: {0}")]
    Forwarding(String),

    /// Insufficient privileges
    #[error("Insufficient privileges: {0}")]
    InsufficientPrivileges(String),

    /// Execution failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl Error {
    /// Create a protocol error with a custom message
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a transmit error with a custom message
    pub fn transmit<S: Into<String>>(msg: S) -> Self {
        Error::Transmit(msg.into())
    }

    /// Create a capture error with a custom message
    pub fn capture<S: Into<String>>(msg: S) -> Self {
        Error::Capture(msg.into())
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether the poisoning loop may absorb this error and keep going.
    ///
    /// Resolution, transmission and parse failures are logged at their point
    /// of origin and retried on the next cycle. Everything else ends the run
    /// (after restoration).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Unresolved(_) | Error::Transmit(_) | Error::PacketParsing(_)
        )
    }
}
