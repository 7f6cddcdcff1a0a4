//! Utility functions and helpers.
//!
//! - Path manipulation (tilde expansion, canonical directory resolution)
//! - Directory fingerprints ([`hash`])
//! - Binary serialization for the record store ([`serialization`])
//! - Worker pool used by parallel check cycles ([`thread_pool`])
//!
//! # Examples
//!
//! ```
//! use backupd::utils::expand_tilde;
//!
//! # fn main() -> anyhow::Result<()> {
//! let path = expand_tilde("~/Documents")?;
//! assert!(path.ends_with("Documents"));
//! # Ok(())
//! # }
//! ```

/// Directory hashing
pub mod hash;
/// Binary serialization utilities
pub mod serialization;
/// Thread pool configuration for parallel check cycles
pub mod thread_pool;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Expands a path starting with `~` to the user's home directory.
///
/// # Errors
///
/// Returns an error if the path is empty.
pub fn expand_tilde(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        anyhow::bail!("Path cannot be empty");
    }
    if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return Ok(home);
    }
    if path.starts_with("~/")
        && let Some(home) = dirs::home_dir()
    {
        return Ok(home.join(&path[2..]));
    }
    Ok(PathBuf::from(path))
}

/// Resolve `path` to an absolute, canonical directory path.
///
/// # Errors
///
/// Returns an error if the path does not exist or is not a directory.
pub fn canonical_dir(path: &str) -> Result<PathBuf> {
    let expanded = expand_tilde(path)?;
    let canonical = expanded
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", expanded.display()))?;
    if !canonical.is_dir() {
        anyhow::bail!("Not a directory: {}", canonical.display());
    }
    Ok(canonical)
}

/// Absolute form of `path`.
///
/// The longest existing prefix is canonicalized and any components that do
/// not exist yet are appended unchanged.
#[must_use]
pub fn absolute_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

/// Whether `inner` is `outer` itself or lies somewhere below it.
#[must_use]
pub fn is_within(inner: &Path, outer: &Path) -> bool {
    absolute_path(inner).starts_with(absolute_path(outer))
}
