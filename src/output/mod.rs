//! User-facing messages for the backupd CLI.
//!
//! Messages go to stderr so stdout stays clean for listings and completion
//! scripts. Operator diagnostics go through `tracing` instead.
//!
//! Besides the styled primitives, this module owns how a check cycle is
//! reported: one line per archive written, one line per failed path, then a
//! summary.

use crate::archive::ArchiveRecord;
use crate::monitor::{CheckResult, PathError};
use colored::Colorize;
use std::sync::atomic::{AtomicU8, Ordering};

/// Verbosity level for output messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Only warnings and errors.
    Quiet = 0,
    /// Default level.
    Normal = 1,
    /// Also print idle cycles and other chatter.
    Verbose = 2,
}

static VERBOSITY: AtomicU8 = AtomicU8::new(1);

/// Sets the process-wide verbosity level.
pub fn set_verbosity(level: Verbosity) {
    VERBOSITY.store(level as u8, Ordering::Relaxed);
}

/// Current process-wide verbosity level.
pub fn get_verbosity() -> Verbosity {
    match VERBOSITY.load(Ordering::Relaxed) {
        0 => Verbosity::Quiet,
        2 => Verbosity::Verbose,
        _ => Verbosity::Normal,
    }
}

fn quiet() -> bool {
    get_verbosity() == Verbosity::Quiet
}

/// Prints a success message in green (respects quiet mode).
pub fn success(message: &str) {
    if !quiet() {
        eprintln!("{}", message.green());
    }
}

/// Prints an error message in bold red (always shown).
pub fn error(message: &str) {
    eprintln!("{}", message.red().bold());
}

/// Prints a warning message in bold yellow (always shown).
pub fn warning(message: &str) {
    eprintln!("{}", message.yellow().bold());
}

/// Prints an informational message in dimmed color (respects quiet mode).
pub fn info(message: &str) {
    if !quiet() {
        eprintln!("{}", message.dimmed());
    }
}

/// Prints a message only in verbose mode.
pub fn verbose(message: &str) {
    if get_verbosity() == Verbosity::Verbose {
        eprintln!("{}", message.dimmed());
    }
}

/// One line describing an archive that was written.
#[must_use]
pub fn archive_line(record: &ArchiveRecord) -> String {
    format!(
        "{} -> {} ({} entries)",
        record.source_path.display(),
        record.destination_file.display(),
        record.entries
    )
}

/// One line describing a path that failed, tagged with its error kind.
#[must_use]
pub fn failure_line(failure: &PathError) -> String {
    format!(
        "{} ({}): {}",
        failure.path.display(),
        failure.error.kind(),
        failure.error
    )
}

/// Closing line of a cycle report, `None` for an idle cycle.
#[must_use]
pub fn cycle_summary(changed: usize, failed: usize) -> Option<String> {
    match (changed, failed) {
        (0, 0) => None,
        (changed, 0) => Some(format!("Archived {changed} directories")),
        (changed, failed) => Some(format!(
            "Archived {changed} directories, {failed} failed (retried next cycle)"
        )),
    }
}

/// Print what a check cycle did: archives written, failures, then a summary.
pub fn cycle_report(result: &CheckResult) {
    if !quiet() {
        for record in &result.archives {
            eprintln!("{} {}", "Archived".dimmed().bold(), archive_line(record));
        }
    }
    for failure in &result.errors {
        error(&format!("✗ {}", failure_line(failure)));
    }

    match cycle_summary(result.changed_count, result.errors.len()) {
        None => verbose("No changes"),
        Some(line) if result.is_clean() => success(&format!("{} {line}", "✓".green().bold())),
        Some(line) => warning(&format!("⚠ {line}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveFormat;
    use crate::error::MonitorError;
    use serial_test::serial;
    use std::path::PathBuf;

    #[test]
    #[serial]
    fn test_verbosity_round_trip() {
        for level in [Verbosity::Quiet, Verbosity::Normal, Verbosity::Verbose] {
            set_verbosity(level);
            assert_eq!(get_verbosity(), level);
        }
        set_verbosity(Verbosity::Normal);
    }

    #[test]
    fn test_failure_line_names_path_and_kind() {
        let failure = PathError {
            path: PathBuf::from("/data/photos"),
            error: MonitorError::PermissionDenied {
                path: PathBuf::from("/data/photos/raw"),
            },
        };
        let line = failure_line(&failure);
        assert!(line.starts_with("/data/photos (permission denied): "));
        assert!(line.ends_with("/data/photos/raw"));
    }

    #[test]
    fn test_archive_line_shows_destination_and_size() {
        let record = ArchiveRecord {
            source_path: PathBuf::from("/data/notes"),
            destination_file: PathBuf::from("/backups/notes-0a1b2c3d-20260101T000000Z.zip"),
            created_at: chrono::Utc::now(),
            format: ArchiveFormat::Zip,
            entries: 12,
        };
        assert_eq!(
            archive_line(&record),
            "/data/notes -> /backups/notes-0a1b2c3d-20260101T000000Z.zip (12 entries)"
        );
    }

    #[test]
    fn test_cycle_summary() {
        assert_eq!(cycle_summary(0, 0), None);
        assert_eq!(cycle_summary(2, 0).as_deref(), Some("Archived 2 directories"));
        assert_eq!(
            cycle_summary(0, 1).as_deref(),
            Some("Archived 0 directories, 1 failed (retried next cycle)")
        );
    }

    #[test]
    #[serial]
    fn test_quiet_report_still_prints_failures() {
        set_verbosity(Verbosity::Quiet);
        let result = CheckResult {
            errors: vec![PathError {
                path: PathBuf::from("/gone"),
                error: MonitorError::NotFound {
                    path: PathBuf::from("/gone"),
                },
            }],
            ..CheckResult::default()
        };
        // Only checks this does not panic without a terminal
        cycle_report(&result);
        set_verbosity(Verbosity::Normal);
    }
}
