//! Archive construction for changed directories.
//!
//! The monitor only knows about the [`Archiver`] capability. One format is
//! supported today ([`ZipArchiver`]); a new format is a new implementation of
//! the trait plus a variant of [`ArchiveFormat`].

mod zip_archiver;

pub use zip_archiver::ZipArchiver;

use crate::config::Config;
use crate::error::MonitorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Container formats the monitor can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// ZIP container
    #[default]
    Zip,
}

impl ArchiveFormat {
    /// File extension (without the dot) used for archives of this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Description of an archive that was written successfully.
///
/// Produced by [`Archiver::write`]; nothing keeps a handle on the file once the
/// record has been returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    /// Directory that was archived
    pub source_path: PathBuf,
    /// Archive file that now holds the snapshot
    pub destination_file: PathBuf,
    /// When the archive was named
    pub created_at: DateTime<Utc>,
    /// Container format of `destination_file`
    pub format: ArchiveFormat,
    /// Number of entries (files, directories, links) stored
    pub entries: usize,
}

/// Packages a directory subtree into a single archive file.
pub trait Archiver: Send + Sync {
    /// Format of the archives this archiver writes.
    fn format(&self) -> ArchiveFormat;

    /// Archive `source` into a new file inside `destination_dir`.
    ///
    /// Implementations must create exactly one new file on success and
    /// none on failure.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ArchiveWriteFailed`] when the archive cannot be
    /// produced, including when a single entry below `source` is unreadable.
    fn write(&self, source: &Path, destination_dir: &Path) -> Result<ArchiveRecord, MonitorError>;
}

/// Build the archiver selected by the `[archive]` config table.
#[must_use]
pub fn from_config(config: &Config) -> Box<dyn Archiver> {
    match config.archive.format {
        ArchiveFormat::Zip => Box::new(
            ZipArchiver::new(config.archive.compression, config.archive.compression_level)
                .with_follow_symlinks(config.hashing.follow_symlinks),
        ),
    }
}

/// Stem shared by every archive of `source`: `<basename>-<tag>`.
///
/// `tag` is derived from the full path so two monitored directories with the
/// same base name never share archive names.
#[must_use]
pub fn archive_stem(source: &Path) -> String {
    let base = source
        .file_name()
        .map(|n| sanitize_component(&n.to_string_lossy()))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "root".to_string());
    let tag = crate::utils::hash::hash_bytes(source.to_string_lossy().as_bytes());
    format!("{base}-{}", &tag[..8])
}

/// Full archive file name for `source` at `timestamp`.
///
/// A non-zero `attempt` appends a numeric suffix, used when a name is taken.
#[must_use]
pub fn archive_file_name(
    source: &Path,
    timestamp: &DateTime<Utc>,
    format: ArchiveFormat,
    attempt: u32,
) -> String {
    let stem = archive_stem(source);
    let stamp = timestamp.format("%Y%m%dT%H%M%S%9fZ");
    if attempt == 0 {
        format!("{stem}-{stamp}.{}", format.extension())
    } else {
        format!("{stem}-{stamp}-{attempt}.{}", format.extension())
    }
}

/// Replace characters that are awkward in file names.
fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}
