//! Root check for raw-socket commands

use arpmitm_core::{Error, Result};

pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

/// Fail with `InsufficientPrivileges` unless running as root
pub fn ensure_root(command: &str) -> Result<()> {
    if is_root() {
        Ok(())
    } else {
        Err(Error::InsufficientPrivileges(format!(
            "'{}' needs raw sockets and write access to ip_forward; run as root",
            command
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_root_matches_euid() {
        match ensure_root("mitm") {
            Ok(()) => assert!(is_root()),
            Err(e) => {
                assert!(!is_root());
                assert!(matches!(e, Error::InsufficientPrivileges(_)));
            }
        }
    }
}
