use crate::BackupContext;
use anyhow::Result;
use colored::Colorize;

/// Length of the hash prefix shown in listings
const SHORT_HASH_LEN: usize = 16;

/// Execute list command - show monitored directories
///
/// # Errors
///
/// Returns an error if the record store cannot be read.
pub fn execute(ctx: &BackupContext) -> Result<()> {
    let records = ctx.store()?.load()?;

    if records.is_empty() {
        super::print_info("No monitored paths. Add one with 'backupd add <path>'");
        return Ok(());
    }

    for record in &records {
        let state = if record.is_unchecked() {
            "never checked".dimmed().to_string()
        } else {
            record
                .hash
                .get(..SHORT_HASH_LEN)
                .unwrap_or(&record.hash)
                .yellow()
                .to_string()
        };
        println!("{state}  {}", record.path.display());
    }

    Ok(())
}
