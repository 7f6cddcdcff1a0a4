use crate::BackupContext;
use crate::utils::{canonical_dir, is_within};
use anyhow::Result;

/// Execute add command - start monitoring directories
///
/// Each path is resolved to an absolute, canonical directory and stored with
/// an empty hash, so the next check archives it.
///
/// # Errors
///
/// Returns an error if:
/// - A path does not exist or is not a directory
/// - The archive destination lies inside the path
/// - The record store cannot be read or written
pub fn execute(ctx: &BackupContext, paths: &[String]) -> Result<()> {
    let store = ctx.store()?;

    for raw in paths {
        let path = canonical_dir(raw)?;
        if is_within(ctx.archive_dir(), &path) {
            anyhow::bail!(
                "Cannot monitor {}: it contains the archive destination {}",
                path.display(),
                ctx.archive_dir().display()
            );
        }

        if store.add(&path)? {
            super::print_success(&format!("Monitoring {}", path.display()));
        } else {
            super::print_info(&format!("Already monitored: {}", path.display()));
        }
    }

    Ok(())
}
