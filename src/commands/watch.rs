use crate::BackupContext;
use crate::lock::RunLock;
use crate::monitor::{CheckResult, Monitor};
use crate::scheduler::{Scheduler, shutdown_signal};
use crate::storage::RecordStore;
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Writes cycle results to the record store, retrying failed saves.
///
/// A save that fails leaves the store dirty; every later cycle retries it,
/// including cycles that changed nothing, until one succeeds.
pub struct HashPersister<'a> {
    store: &'a RecordStore,
    dirty: bool,
}

impl<'a> HashPersister<'a> {
    /// Start with nothing outstanding.
    #[must_use]
    pub const fn new(store: &'a RecordStore) -> Self {
        Self {
            store,
            dirty: false,
        }
    }

    /// Whether a save is still outstanding.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist after a cycle if anything changed or an earlier save failed.
    pub fn after_cycle(&mut self, monitor: &Monitor, result: &CheckResult) {
        if result.changed_count == 0 && !self.dirty {
            return;
        }
        if let Err(e) = self.flush(monitor) {
            warn!(error = %format!("{e:#}"), "Failed to save hashes, will retry next cycle");
            super::print_warning(&format!("Failed to save hashes: {e:#}"));
        }
    }

    /// Save the monitor's current hashes now.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written; the persister stays
    /// dirty in that case.
    pub fn flush(&mut self, monitor: &Monitor) -> Result<()> {
        self.dirty = true;
        self.store.apply_hashes(monitor.paths())?;
        self.dirty = false;
        Ok(())
    }
}

/// Execute watch command - check periodically until interrupted
///
/// # Errors
///
/// Returns an error if:
/// - No paths are monitored or the archive destination is unusable
/// - Another `check` or `watch` runs against the same record store
/// - The async runtime or signal handlers cannot be set up
/// - Hashes from the final cycles could not be saved before exit
pub fn execute(ctx: &BackupContext) -> Result<()> {
    let store = ctx.store()?;
    let _lock = RunLock::acquire(ctx.db_path())?;
    let monitor = ctx.load_monitor(&store)?;
    monitor.preflight()?;

    super::print_info(&format!(
        "Watching {} directories every {}, archiving to {}",
        monitor.len(),
        humantime::format_duration(ctx.config.interval()),
        monitor.destination().display()
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let mut persister = HashPersister::new(&store);
    let scheduler = Scheduler::new(ctx.config.interval());
    let monitor = runtime.block_on(async {
        let shutdown = shutdown_signal()?;
        scheduler
            .run(
                monitor,
                |monitor, result| {
                    crate::output::cycle_report(result);
                    persister.after_cycle(monitor, result);
                },
                shutdown,
            )
            .await
    })?;

    if persister.is_dirty() {
        persister
            .flush(&monitor)
            .context("Hashes of archived directories could not be saved")?;
    }
    info!("Stopped");
    super::print_info("Stopped");
    Ok(())
}
