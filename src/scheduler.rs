//! Periodic driver for [`Monitor::check`].
//!
//! The scheduler runs one check immediately, then one every `interval` until
//! the shutdown future resolves. Checks run on tokio's blocking pool so the
//! runtime stays responsive to signals while a large tree is hashed. A
//! shutdown that arrives mid-check lets the check finish and its results be
//! handed to the cycle callback before the loop stops.

use crate::monitor::{CheckResult, Monitor};
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Runs check cycles at a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    /// Create a scheduler that waits `interval` between the end of one check
    /// and the start of the next.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Pause between checks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Run check cycles until `shutdown` resolves.
    ///
    /// `on_cycle` sees the monitor and the result of every completed check,
    /// which is where callers persist updated hashes. The monitor is handed
    /// back once the loop stops.
    ///
    /// # Errors
    ///
    /// Returns an error if a check task panics.
    pub async fn run<F, S>(&self, mut monitor: Monitor, mut on_cycle: F, shutdown: S) -> Result<Monitor>
    where
        F: FnMut(&Monitor, &CheckResult),
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut cycles: u64 = 0;

        info!(interval = %humantime::format_duration(self.interval), "Watching");
        loop {
            let task = tokio::task::spawn_blocking(move || {
                let result = monitor.check();
                (monitor, result)
            });
            let (returned, result) = task.await.context("Check task panicked")?;
            monitor = returned;
            cycles += 1;
            on_cycle(&monitor, &result);

            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!(cycles, "Shutdown requested, stopping");
                    break;
                }
                () = tokio::time::sleep(self.interval) => {
                    debug!(cycles, "Interval elapsed");
                }
            }
        }

        Ok(monitor)
    }
}

/// Future that resolves on SIGINT or SIGTERM (Ctrl-C elsewhere).
///
/// Handlers are installed when this is called, not when the future is first
/// polled, so a signal delivered during the first check is not lost. Must be
/// called from within a tokio runtime.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
#[cfg(unix)]
pub fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt =
        signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("Received SIGINT"),
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    })
}

/// Future that resolves on Ctrl-C.
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(unix))]
pub fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
        }
    })
}
