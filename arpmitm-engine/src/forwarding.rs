//! Kernel IP forwarding switch
//!
//! While poisoned, the victim's traffic reaches the operator's host. With
//! forwarding on, the kernel relays it to the real destination so the
//! victim keeps working.

use arpmitm_core::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// Turns IPv4 forwarding on and off
pub trait ForwardingControl: Send + Sync {
    fn set_forwarding(&self, enabled: bool) -> Result<()>;
}

/// Forwarding through a procfs/sysctl file such as `/proc/sys/net/ipv4/ip_forward`
#[derive(Debug, Clone)]
pub struct ProcForwarding {
    path: PathBuf,
}

impl ProcForwarding {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current value of the switch
    pub fn is_enabled(&self) -> Result<bool> {
        let value = fs::read_to_string(&self.path).map_err(|e| self.map_io(e))?;
        match value.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(Error::Forwarding(format!(
                "{}: unexpected value '{}'",
                self.path.display(),
                other
            ))),
        }
    }

    fn map_io(&self, e: std::io::Error) -> Error {
        if e.kind() == ErrorKind::PermissionDenied {
            Error::InsufficientPrivileges(format!("cannot write {}", self.path.display()))
        } else {
            Error::Forwarding(format!("{}: {}", self.path.display(), e))
        }
    }
}

impl ForwardingControl for ProcForwarding {
    fn set_forwarding(&self, enabled: bool) -> Result<()> {
        let value = if enabled { "1\n" } else { "0\n" };
        fs::write(&self.path, value).map_err(|e| self.map_io(e))?;
        info!(
            path = %self.path.display(),
            enabled,
            "IP forwarding {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("arpmitm-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_toggle_writes_file() {
        let path = scratch_file("ip_forward");
        fs::write(&path, "0\n").unwrap();
        let forwarding = ProcForwarding::new(&path);

        forwarding.set_forwarding(true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\n");
        assert!(forwarding.is_enabled().unwrap());

        forwarding.set_forwarding(false).unwrap();
        assert!(!forwarding.is_enabled().unwrap());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_directory_is_forwarding_error() {
        let forwarding = ProcForwarding::new(scratch_file("no-such-dir").join("ip_forward"));
        assert!(matches!(
            forwarding.set_forwarding(true),
            Err(Error::Forwarding(_))
        ));
    }

    #[test]
    fn test_unexpected_contents() {
        let path = scratch_file("ip_forward_garbage");
        fs::write(&path, "yes\n").unwrap();
        let forwarding = ProcForwarding::new(&path);

        assert!(matches!(forwarding.is_enabled(), Err(Error::Forwarding(_))));
        fs::remove_file(&path).unwrap();
    }
}
