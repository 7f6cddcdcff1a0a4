//! Per-path error taxonomy for check cycles.
//!
//! Every failure the monitor can hit while hashing or archiving a single
//! monitored path is expressed as a [`MonitorError`]. These errors are
//! collected into [`crate::monitor::CheckResult::errors`] and never abort a
//! cycle. Configuration-time failures use `anyhow` instead, since they are
//! fatal and only ever reported to the operator.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while hashing or archiving one monitored path.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The monitored path (or an entry below it) vanished.
    #[error("Path does not exist: {}", path.display())]
    NotFound {
        /// Path that could not be found
        path: PathBuf,
    },

    /// An entry below the monitored path could not be read.
    #[error("Permission denied: {}", path.display())]
    PermissionDenied {
        /// Path that could not be read
        path: PathBuf,
    },

    /// The archive could not be produced or written to the destination.
    #[error("Failed to write archive for {}: {reason}", path.display())]
    ArchiveWriteFailed {
        /// Source directory being archived
        path: PathBuf,
        /// Short description of what failed
        reason: String,
        /// Underlying error, if any
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generic I/O failure while traversing the tree.
    #[error("Failed to hash {}: {source}", path.display())]
    HashComputationFailed {
        /// Path whose traversal failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Fieldless discriminant of [`MonitorError`], handy for matching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`MonitorError::NotFound`]
    NotFound,
    /// See [`MonitorError::PermissionDenied`]
    PermissionDenied,
    /// See [`MonitorError::ArchiveWriteFailed`]
    ArchiveWriteFailed,
    /// See [`MonitorError::HashComputationFailed`]
    HashComputationFailed,
}

impl ErrorKind {
    /// Short label used in log lines and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::ArchiveWriteFailed => "archive write failed",
            Self::HashComputationFailed => "hash computation failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MonitorError {
    /// Classify an I/O error encountered while hashing `path`.
    #[must_use]
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::HashComputationFailed {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// Classify a traversal error reported by `walkdir`.
    ///
    /// The entry path reported by walkdir is preferred over `root` so the
    /// operator sees which file was unreadable.
    #[must_use]
    pub fn from_walkdir(root: &Path, err: walkdir::Error) -> Self {
        let path = err.path().unwrap_or(root).to_path_buf();
        if err.loop_ancestor().is_some() {
            return Self::HashComputationFailed {
                source: io::Error::other(format!("filesystem loop at {}", path.display())),
                path,
            };
        }
        match err.into_io_error() {
            Some(io_err) => Self::from_io(&path, io_err),
            None => Self::HashComputationFailed {
                source: io::Error::other("unknown traversal error"),
                path,
            },
        }
    }

    /// Build an [`MonitorError::ArchiveWriteFailed`] wrapping `source`.
    pub fn archive<E>(path: &Path, reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ArchiveWriteFailed {
            path: path.to_path_buf(),
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::ArchiveWriteFailed { .. } => ErrorKind::ArchiveWriteFailed,
            Self::HashComputationFailed { .. } => ErrorKind::HashComputationFailed,
        }
    }

    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path }
            | Self::PermissionDenied { path }
            | Self::ArchiveWriteFailed { path, .. }
            | Self::HashComputationFailed { path, .. } => path,
        }
    }
}
