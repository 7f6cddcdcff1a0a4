/// `backupd add`
pub mod add;
/// `backupd check`
pub mod check;
/// `backupd list`
pub mod list;
/// `backupd remove`
pub mod remove;
/// `backupd watch`
pub mod watch;

use crate::output;
use colored::Colorize;

/// Print a confirmation, prefixed with a check mark.
pub fn print_success(message: &str) {
    output::success(&format!("{} {}", "✓".green().bold(), message));
}

/// Print a note that is hidden in quiet mode.
pub fn print_info(message: &str) {
    output::info(&format!("ℹ {message}"));
}

/// Print a warning that is shown even in quiet mode.
pub fn print_warning(message: &str) {
    output::warning(&format!("⚠ {message}"));
}
