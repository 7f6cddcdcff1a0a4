use crate::BackupContext;
use crate::lock::RunLock;
use anyhow::{Context, Result};

/// Execute check command - run exactly one check cycle
///
/// Holds the run lock for the duration of the cycle, so a one-off check
/// never overlaps a running watcher. Updated hashes are written back to the
/// record store before the summary is printed.
///
/// # Errors
///
/// Returns an error if:
/// - Another `check` or `watch` holds the run lock
/// - No paths are monitored or the archive destination is unusable
/// - The record store cannot be read or written
/// - Any monitored path failed (after the others were processed)
pub fn execute(ctx: &BackupContext) -> Result<()> {
    let _lock = RunLock::acquire(ctx.db_path())?;
    let store = ctx.store()?;
    let mut monitor = ctx.load_monitor(&store)?;
    monitor.preflight()?;

    let result = monitor.check();
    store
        .apply_hashes(&result.updated_hashes)
        .context("Archives were written but updated hashes could not be saved")?;
    crate::output::cycle_report(&result);

    if !result.is_clean() {
        anyhow::bail!("{} monitored paths failed", result.errors.len());
    }
    Ok(())
}
