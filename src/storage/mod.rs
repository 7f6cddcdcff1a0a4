//! Durable storage of monitored paths and their last-known hashes.

/// Record store file handling
pub mod records;

pub use records::RecordStore;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persisted form of a monitored path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRecord {
    /// Absolute path of the monitored directory
    pub path: PathBuf,
    /// Hex digest of the last archived state, empty if never archived
    pub hash: String,
}

impl PathRecord {
    /// A record for a path that has never been checked.
    #[must_use]
    pub fn unchecked(path: PathBuf) -> Self {
        Self {
            path,
            hash: String::new(),
        }
    }

    /// Whether this path has never been archived.
    #[must_use]
    pub fn is_unchecked(&self) -> bool {
        self.hash.is_empty()
    }
}
