//! CLI interface for arpmitm
//!
//! This crate provides the command-line interface for arpmitm: argument
//! parsing, the root check, shutdown signals and the help text.

pub mod args;
pub mod privileges;
pub mod signals;

pub use args::{Cli, Commands};
pub use privileges::ensure_root;
pub use signals::shutdown_signal;
