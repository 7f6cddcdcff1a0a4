use crate::BackupContext;
use crate::utils::{absolute_path, expand_tilde};
use anyhow::Result;

/// Execute remove command - stop monitoring directories
///
/// Paths do not need to exist any more; they are matched against the stored
/// absolute form. Archives already written are left alone.
///
/// # Errors
///
/// Returns an error if the record store cannot be read or written.
pub fn execute(ctx: &BackupContext, paths: &[String]) -> Result<()> {
    let store = ctx.store()?;
    let mut missing = 0;

    for raw in paths {
        let path = absolute_path(&expand_tilde(raw)?);
        if store.remove(&path)? {
            super::print_success(&format!("Stopped monitoring {}", path.display()));
        } else {
            super::print_warning(&format!("Not monitored: {}", path.display()));
            missing += 1;
        }
    }

    if missing == paths.len() {
        anyhow::bail!("None of the given paths were monitored");
    }
    Ok(())
}
