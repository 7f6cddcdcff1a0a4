/// TOML parsing and value validation.
pub mod parser;
/// Unknown-key detection for config files.
pub mod validator;

use crate::archive::ArchiveFormat;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Top-level contents of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Store location, archive destination and polling interval
    #[serde(default)]
    pub core: CoreConfig,

    /// Archive format and compression settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Directory traversal settings
    #[serde(default)]
    pub hashing: HashingConfig,

    /// Worker pool settings
    #[serde(default)]
    pub performance: PerformanceConfig,
}

/// The `[core]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Directory holding the path record store
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Directory archives are written to
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
    /// Seconds between two check cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// The `[archive]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Container format
    #[serde(default)]
    pub format: ArchiveFormat,
    /// Compression applied to file entries
    #[serde(default = "default_compression")]
    pub compression: CompressionMethod,
    /// `None` uses the compression method's own default
    #[serde(default)]
    pub compression_level: Option<i64>,
}

/// Compression applied to entries inside the archive container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    /// Deflate, levels 0-9
    Deflate,
    /// Zstandard, levels -7 to 22
    Zstd,
    /// No compression
    Stored,
}

impl CompressionMethod {
    /// Accepted range of explicit compression levels, `None` if levels are
    /// not supported.
    #[must_use]
    pub const fn level_range(self) -> Option<(i64, i64)> {
        match self {
            Self::Deflate => Some((0, 9)),
            Self::Zstd => Some((-7, 22)),
            Self::Stored => None,
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deflate => "deflate",
            Self::Zstd => "zstd",
            Self::Stored => "stored",
        })
    }
}

/// The `[hashing]` table.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HashingConfig {
    /// Follow symbolic links instead of hashing their targets' paths
    #[serde(default)]
    pub follow_symlinks: bool,
}

/// The `[performance]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Hash and archive monitored paths on a worker pool
    #[serde(default)]
    pub parallel_checks: bool,
    /// Worker count when `parallel_checks` is set
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            archive_dir: default_archive_dir(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            format: ArchiveFormat::Zip,
            compression: default_compression(),
            compression_level: None,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            parallel_checks: false,
            parallel_threads: default_parallel_threads(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// A missing file is created with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories
    /// - Cannot read or parse the configuration file
    /// - Configuration file contains invalid TOML or invalid values
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        parser::parse_config_file(path)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories
    /// - Cannot write to the file
    /// - TOML serialization fails
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(toml_str.as_bytes())?;
        Ok(())
    }

    /// Polling interval as a [`std::time::Duration`].
    #[must_use]
    pub const fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.core.interval_secs)
    }
}

static NUM_CPUS: std::sync::LazyLock<usize> = std::sync::LazyLock::new(|| {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
});

fn backupd_home() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    home.join(crate::DEFAULT_DATA_DIR)
}

// Default functions for serde
fn default_db_path() -> PathBuf {
    backupd_home().join("db")
}

fn default_archive_dir() -> PathBuf {
    backupd_home().join("archive")
}

const fn default_interval_secs() -> u64 {
    10
}

const fn default_compression() -> CompressionMethod {
    CompressionMethod::Deflate
}

fn default_parallel_threads() -> usize {
    (*NUM_CPUS).min(8)
}
