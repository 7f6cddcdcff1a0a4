//! Command-line interface definitions for backupd.
//!
//! The CLI definitions are shared between the main binary and build tools
//! (like xtask) for man page generation.
//!
//! Note: Field-level documentation is provided via clap attributes, so we
//! allow `missing_docs` for this module to avoid redundant documentation.

#![allow(missing_docs)]

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Main CLI structure for backupd.
#[derive(Parser)]
#[command(
    name = "backupd",
    version = crate::VERSION,
    about = "Directory backup monitor",
    long_about = "Watches directories and writes a compressed archive of each one whenever its content changes"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Record store directory (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    pub db: Option<PathBuf>,

    /// Archive destination directory (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    pub archive: Option<PathBuf>,
}

/// All available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start monitoring directories
    Add {
        /// Directories to monitor
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Stop monitoring directories
    #[command(alias = "rm")]
    Remove {
        /// Directories to stop monitoring
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// List monitored directories and their last archived hash
    #[command(alias = "ls")]
    List,

    /// Run a single check cycle
    Check,

    /// Check monitored directories periodically until interrupted
    Watch {
        /// Seconds between checks (overrides config)
        #[arg(short, long, value_name = "SECS")]
        interval: Option<u64>,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
