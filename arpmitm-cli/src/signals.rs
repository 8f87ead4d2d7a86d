//! Shutdown signal for the mitm command

use arpmitm_core::Result;
use std::future::Future;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Install SIGINT and SIGTERM handlers now and return a future that
/// completes on the first of them.
///
/// The handlers are registered before this returns, so a signal that
/// arrives before the future is first polled is still caught.
pub fn shutdown_signal() -> Result<impl Future<Output = ()> + Send> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("Interrupt received"),
            _ = terminate.recv() => info!("Terminate received"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_before_first_poll_is_caught() {
        let shutdown = shutdown_signal().unwrap();

        // SAFETY: the handler installed above replaces the default action
        unsafe {
            libc::raise(libc::SIGTERM);
        }

        tokio::time::timeout(Duration::from_secs(2), shutdown)
            .await
            .expect("shutdown should complete");
    }
}
