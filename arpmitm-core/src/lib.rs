//! arpmitm core library
//!
//! This crate provides the shared error type, address types, interface
//! lookup, engine configuration and per-run session state used by the other
//! arpmitm crates.

pub mod config;
pub mod error;
pub mod interface;
pub mod packet;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use interface::Interface;
pub use packet::RawFrame;
pub use session::{PoisonState, Session, SessionCounters, SessionStats};
pub use types::*;
