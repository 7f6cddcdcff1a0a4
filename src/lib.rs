#![warn(missing_docs)]
// Allow pedantic strict lints that create false positives in this codebase
#![allow(clippy::arithmetic_side_effects)] // Simple counters cannot overflow
#![allow(clippy::indexing_slicing)] // Bounds checked by logic

//! # backupd - Directory Backup Monitor
//!
//! backupd watches a set of directories and writes a compressed snapshot of
//! each one whenever its content changes.
//!
//! ## How it works
//!
//! - **Content hashing**: every monitored directory is reduced to a SHA-256
//!   digest over its structure and file contents (timestamps and permission
//!   bits are ignored)
//! - **Change detection**: a check cycle re-hashes each directory and compares
//!   against the hash of its last archived state
//! - **Archival**: changed directories are packed into a uniquely named zip
//!   archive in the destination directory, written atomically
//! - **Failure isolation**: a directory that cannot be read or archived keeps
//!   its previous hash and is retried on the next cycle
//!
//! ## Architecture
//!
//! - [`monitor`]: the check cycle
//! - [`utils::hash`]: directory hashing
//! - [`archive`]: archive writers
//! - [`scheduler`]: periodic driver with signal-aware shutdown
//! - [`storage`]: persisted path records
//! - [`config`]: configuration parsing and validation
//! - [`commands`]: CLI command implementations
//! - [`output`]: user-facing messages
//!
//! ## Example Usage
//!
//! ```no_run
//! use backupd::BackupContext;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = BackupContext::new()?;
//! backupd::commands::add::execute(&ctx, &["~/notes".to_string()])?;
//! backupd::commands::check::execute(&ctx)?;
//! # Ok(())
//! # }
//! ```

/// Archive writers.
pub mod archive;

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// Commands module containing all CLI command implementations.
pub mod commands;

/// Configuration parsing, validation, and management.
pub mod config;

/// Per-path error type.
pub mod error;

/// Run locking shared by `check` and `watch`.
pub mod lock;

/// The change-detection-and-archival engine.
pub mod monitor;

/// Output formatting for the CLI.
pub mod output;

/// Periodic check driver.
pub mod scheduler;

/// Persisted path records.
pub mod storage;

/// Utility functions and helpers.
pub mod utils;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub use error::MonitorError;
pub use monitor::{CheckResult, Monitor, PathError};

/// Current version of the backupd binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default data directory name within the home directory.
pub const DEFAULT_DATA_DIR: &str = ".backupd";

/// Default configuration file path relative to home directory.
pub const DEFAULT_CONFIG_PATH: &str = ".config/backupd/config.toml";

/// Central context for all backupd operations.
///
/// Holds the loaded configuration with environment and command-line
/// overrides applied.
///
/// # Examples
///
/// ```no_run
/// use backupd::BackupContext;
///
/// # fn main() -> anyhow::Result<()> {
/// // Default paths, honouring BACKUPD_* environment variables
/// let ctx = BackupContext::new()?;
///
/// // Explicit config file, no environment lookups (for testing)
/// let ctx = BackupContext::new_explicit("/tmp/backupd/config.toml".into())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BackupContext {
    /// Path to the configuration file.
    pub config_path: PathBuf,

    /// Loaded configuration settings.
    pub config: config::Config,
}

impl BackupContext {
    /// Creates a context from the default configuration file.
    ///
    /// `BACKUPD_CONFIG_PATH` replaces the config file location;
    /// `BACKUPD_DB_PATH` and `BACKUPD_ARCHIVE_DIR` override the matching
    /// config values.
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined or if the
    /// configuration file cannot be read, created or validated.
    pub fn new() -> Result<Self> {
        let config_path = if let Ok(path) = std::env::var("BACKUPD_CONFIG_PATH") {
            PathBuf::from(path)
        } else {
            let home = dirs::home_dir().context("Could not find home directory")?;
            home.join(DEFAULT_CONFIG_PATH)
        };

        let validator = config::validator::ConfigValidator::new();
        if let Err(e) = validator.validate_config_file(&config_path) {
            output::warning(&format!("Configuration validation failed: {e}"));
        }

        let mut context = Self::new_explicit(config_path)?;
        let db = std::env::var_os("BACKUPD_DB_PATH").map(PathBuf::from);
        let archive = std::env::var_os("BACKUPD_ARCHIVE_DIR").map(PathBuf::from);
        context.override_paths(db.as_deref(), archive.as_deref());
        Ok(context)
    }

    /// Creates a context from an explicit config file, without consulting
    /// the environment. A missing file is created with defaults.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be loaded or created.
    pub fn new_explicit(config_path: PathBuf) -> Result<Self> {
        let config = config::Config::load(&config_path).with_context(|| {
            format!("Invalid configuration: {}", config_path.display())
        })?;
        let mut context = Self {
            config_path,
            config,
        };
        context.normalize_paths();
        Ok(context)
    }

    /// Replace the database and/or archive directory.
    pub fn override_paths(&mut self, db: Option<&Path>, archive: Option<&Path>) {
        if let Some(db) = db {
            self.config.core.db_path = db.to_path_buf();
        }
        if let Some(archive) = archive {
            self.config.core.archive_dir = archive.to_path_buf();
        }
        self.normalize_paths();
    }

    /// Replace the polling interval.
    ///
    /// # Errors
    /// Returns an error if `secs` is zero.
    pub fn override_interval(&mut self, secs: u64) -> Result<()> {
        if secs == 0 {
            anyhow::bail!("Interval must be at least 1 second");
        }
        self.config.core.interval_secs = secs;
        Ok(())
    }

    fn normalize_paths(&mut self) {
        let core = &mut self.config.core;
        core.db_path = utils::absolute_path(&core.db_path);
        core.archive_dir = utils::absolute_path(&core.archive_dir);
    }

    /// Directory of the record store.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.config.core.db_path
    }

    /// Directory archives are written to.
    #[must_use]
    pub fn archive_dir(&self) -> &Path {
        &self.config.core.archive_dir
    }

    /// Opens the record store.
    ///
    /// # Errors
    /// Returns an error if the database directory cannot be created.
    pub fn store(&self) -> Result<storage::RecordStore> {
        storage::RecordStore::open(self.db_path())
    }

    /// Builds a monitor over every stored path.
    ///
    /// # Errors
    /// Returns an error if the record store cannot be read or the worker pool
    /// cannot be created.
    pub fn load_monitor(&self, store: &storage::RecordStore) -> Result<Monitor> {
        let records = store.load()?;
        Monitor::from_config(&self.config, records)
    }
}
