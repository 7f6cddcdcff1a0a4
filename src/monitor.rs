//! The change-detection-and-archival engine.
//!
//! A [`Monitor`] owns the mapping from monitored directory to the hash of its
//! last archived state. Each [`Monitor::check`] re-hashes every directory,
//! archives the ones whose hash moved, and reports what happened in a
//! [`CheckResult`]. Failures are isolated per path: a directory that cannot be
//! hashed or archived keeps its previous hash and is retried on the next
//! check, while the other directories are processed normally.
//!
//! ```no_run
//! use backupd::archive::ZipArchiver;
//! use backupd::monitor::Monitor;
//!
//! let mut monitor = Monitor::new("/srv/archive", Box::new(ZipArchiver::default()))
//!     .with_paths([("/home/me/notes".into(), String::new())]);
//!
//! let result = monitor.check();
//! println!("archived {} directories", result.changed_count);
//! ```

use crate::archive::{self, ArchiveRecord, Archiver};
use crate::config::Config;
use crate::error::MonitorError;
use crate::storage::PathRecord;
use crate::utils::hash::DirectoryHasher;
use crate::utils::{is_within, thread_pool};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

/// A per-path failure recorded during a check.
#[derive(Debug)]
pub struct PathError {
    /// Monitored path the failure belongs to
    pub path: PathBuf,
    /// What went wrong
    pub error: MonitorError,
}

/// Outcome of one [`Monitor::check`].
#[derive(Debug, Default)]
pub struct CheckResult {
    /// Number of paths archived during this check
    pub changed_count: usize,
    /// Every monitored path with its hash after the check
    pub updated_hashes: BTreeMap<PathBuf, String>,
    /// Failures, in path order
    pub errors: Vec<PathError>,
    /// Archives written, in path order
    pub archives: Vec<ArchiveRecord>,
}

impl CheckResult {
    /// Whether every path was processed without error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What happened to a single path during a check.
enum Outcome {
    Unchanged,
    Archived {
        digest: String,
        record: ArchiveRecord,
    },
    Failed(MonitorError),
}

/// Watches a fixed set of directories and archives them when they change.
pub struct Monitor {
    /// Directory archives are written to
    destination: PathBuf,
    /// Produces the archive for a changed directory
    archiver: Box<dyn Archiver>,
    /// Computes directory digests
    hasher: DirectoryHasher,
    /// Monitored path -> hash of the last archived state ("" = never)
    paths: BTreeMap<PathBuf, String>,
    /// Worker pool for parallel checks, sequential when `None`
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Monitor {
    /// Create a monitor with no paths, writing archives to `destination`.
    #[must_use]
    pub fn new(destination: impl Into<PathBuf>, archiver: Box<dyn Archiver>) -> Self {
        Self {
            destination: destination.into(),
            archiver,
            hasher: DirectoryHasher::default(),
            paths: BTreeMap::new(),
            pool: None,
        }
    }

    /// Build a monitor from configuration and the persisted records.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool for parallel checks cannot be
    /// created.
    pub fn from_config(config: &Config, records: Vec<PathRecord>) -> Result<Self> {
        let mut monitor = Self::new(&config.core.archive_dir, archive::from_config(config))
            .with_hasher(DirectoryHasher::from_config(config))
            .with_paths(records.into_iter().map(|r| (r.path, r.hash)));
        if let Some(pool) =
            thread_pool::from_config(config).context("Failed to create worker pool")?
        {
            monitor = monitor.with_pool(pool);
        }
        Ok(monitor)
    }

    /// Use `hasher` for digests.
    #[must_use]
    pub fn with_hasher(mut self, hasher: DirectoryHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Run checks on `pool`.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<rayon::ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Add `(path, last_hash)` pairs. Later duplicates replace earlier ones.
    #[must_use]
    pub fn with_paths<I>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = (PathBuf, String)>,
    {
        self.paths.extend(paths);
        self
    }

    /// Start monitoring `path` with the given last-known hash.
    ///
    /// Returns the previous hash if the path was already monitored.
    pub fn insert(&mut self, path: PathBuf, hash: String) -> Option<String> {
        self.paths.insert(path, hash)
    }

    /// Monitored paths and their current hashes.
    #[must_use]
    pub const fn paths(&self) -> &BTreeMap<PathBuf, String> {
        &self.paths
    }

    /// Current hash of `path`, if it is monitored.
    #[must_use]
    pub fn hash_of(&self, path: &Path) -> Option<&str> {
        self.paths.get(path).map(String::as_str)
    }

    /// Number of monitored paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no paths are monitored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Directory archives are written to.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Reject configurations the check loop cannot run with.
    ///
    /// The destination directory is created if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No paths are monitored
    /// - The destination cannot be created or written to
    /// - The destination lies inside a monitored path (every archive would
    ///   change that path's hash)
    pub fn preflight(&self) -> Result<()> {
        if self.paths.is_empty() {
            anyhow::bail!("No monitored paths. Add one with 'backupd add <path>'");
        }

        std::fs::create_dir_all(&self.destination).with_context(|| {
            format!(
                "Archive destination is not reachable: {}",
                self.destination.display()
            )
        })?;
        tempfile::tempfile_in(&self.destination).with_context(|| {
            format!(
                "Archive destination is not writable: {}",
                self.destination.display()
            )
        })?;

        if let Some(path) = self
            .paths
            .keys()
            .find(|path| is_within(&self.destination, path))
        {
            anyhow::bail!(
                "Archive destination {} is inside monitored path {}",
                self.destination.display(),
                path.display()
            );
        }

        Ok(())
    }

    /// Run one check cycle over every monitored path.
    ///
    /// Never fails as a whole; per-path failures are reported in
    /// [`CheckResult::errors`] and leave that path's hash untouched.
    pub fn check(&mut self) -> CheckResult {
        let span = info_span!("check", paths = self.paths.len());
        let _guard = span.enter();
        info!("Checking monitored paths");

        let outcomes: Vec<(PathBuf, Outcome)> = {
            let work: Vec<(&PathBuf, &String)> = self.paths.iter().collect();
            let run = |(path, stored): &(&PathBuf, &String)| {
                ((*path).clone(), self.process(path, stored))
            };
            match &self.pool {
                Some(pool) => pool.install(|| work.par_iter().map(run).collect()),
                None => work.iter().map(run).collect(),
            }
        };

        let mut result = CheckResult::default();
        for (path, outcome) in outcomes {
            match outcome {
                Outcome::Unchanged => {}
                Outcome::Archived { digest, record } => {
                    self.paths.insert(path, digest);
                    result.changed_count += 1;
                    result.archives.push(record);
                }
                Outcome::Failed(error) => {
                    warn!(
                        path = %path.display(),
                        kind = %error.kind(),
                        error = %error,
                        "Check failed for path"
                    );
                    result.errors.push(PathError { path, error });
                }
            }
        }
        result.updated_hashes = self.paths.clone();

        if result.changed_count > 0 {
            info!(archived = result.changed_count, "Archived changed directories");
        } else {
            info!("No changes");
        }
        result
    }

    /// Hash `path` and archive it if the digest moved away from `stored`.
    fn process(&self, path: &Path, stored: &str) -> Outcome {
        let digest = match self.hasher.hash(path) {
            Ok(digest) => digest,
            Err(error) => return Outcome::Failed(error),
        };

        if digest == stored {
            debug!(path = %path.display(), "Unchanged");
            return Outcome::Unchanged;
        }

        debug!(
            path = %path.display(),
            previous = stored,
            current = %digest,
            "Change detected"
        );
        match self.archiver.write(path, &self.destination) {
            Ok(record) => Outcome::Archived { digest, record },
            Err(error) => Outcome::Failed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveFormat, ZipArchiver};
    use crate::error::ErrorKind;
    use crate::utils::hash::hash_directory;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};

    /// Archiver that always fails, counting attempts.
    struct FailingArchiver {
        attempts: Arc<AtomicUsize>,
    }

    impl Archiver for FailingArchiver {
        fn format(&self) -> ArchiveFormat {
            ArchiveFormat::Zip
        }

        fn write(&self, source: &Path, _dest: &Path) -> Result<ArchiveRecord, MonitorError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(MonitorError::ArchiveWriteFailed {
                path: source.to_path_buf(),
                reason: "destination full".to_string(),
                source: None,
            })
        }
    }

    fn source_tree(content: &str) -> Result<TempDir> {
        let dir = tempdir()?;
        fs::write(dir.path().join("file.txt"), content)?;
        Ok(dir)
    }

    fn archive_count(dest: &Path) -> Result<usize> {
        Ok(fs::read_dir(dest)?.count())
    }

    #[test]
    fn test_first_check_archives_everything() -> Result<()> {
        let a = source_tree("a")?;
        let dest = tempdir()?;
        let mut monitor = Monitor::new(dest.path(), Box::new(ZipArchiver::default()))
            .with_paths([(a.path().to_path_buf(), String::new())]);

        let result = monitor.check();
        assert_eq!(result.changed_count, 1);
        assert!(result.is_clean());
        assert_eq!(result.archives.len(), 1);
        assert_eq!(
            monitor.hash_of(a.path()),
            Some(hash_directory(a.path())?.as_str())
        );
        assert_eq!(archive_count(dest.path())?, 1);
        Ok(())
    }

    #[test]
    fn test_archive_failure_keeps_previous_hash() -> Result<()> {
        let a = source_tree("a")?;
        let dest = tempdir()?;
        let attempts = Arc::new(AtomicUsize::new(0));
        let archiver = FailingArchiver {
            attempts: Arc::clone(&attempts),
        };
        let mut monitor = Monitor::new(dest.path(), Box::new(archiver))
            .with_paths([(a.path().to_path_buf(), "old".to_string())]);

        let first = monitor.check();
        assert_eq!(first.changed_count, 0);
        assert_eq!(first.errors.len(), 1);
        assert_eq!(first.errors[0].error.kind(), ErrorKind::ArchiveWriteFailed);
        assert_eq!(monitor.hash_of(a.path()), Some("old"));

        // The change is retried on the next cycle rather than accepted
        let second = monitor.check();
        assert_eq!(second.errors.len(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn test_parallel_matches_sequential() -> Result<()> {
        let trees: Vec<TempDir> = (0..6)
            .map(|i| source_tree(&format!("content {i}")))
            .collect::<Result<_>>()?;
        let missing = tempdir()?.path().join("gone");

        let paths: Vec<(PathBuf, String)> = trees
            .iter()
            .map(|t| (t.path().to_path_buf(), String::new()))
            .chain([(missing, String::new())])
            .collect();

        let seq_dest = tempdir()?;
        let mut sequential = Monitor::new(seq_dest.path(), Box::new(ZipArchiver::default()))
            .with_paths(paths.clone());
        let par_dest = tempdir()?;
        let mut parallel = Monitor::new(par_dest.path(), Box::new(ZipArchiver::default()))
            .with_paths(paths)
            .with_pool(thread_pool::build_pool(4)?);

        let seq = sequential.check();
        let par = parallel.check();

        assert_eq!(seq.changed_count, 6);
        assert_eq!(par.changed_count, 6);
        assert_eq!(seq.updated_hashes, par.updated_hashes);
        let seq_errs: Vec<_> = seq.errors.iter().map(|e| e.path.clone()).collect();
        let par_errs: Vec<_> = par.errors.iter().map(|e| e.path.clone()).collect();
        assert_eq!(seq_errs, par_errs);
        assert_eq!(archive_count(par_dest.path())?, 6);
        Ok(())
    }

    #[test]
    fn test_preflight_rejects_empty_monitor() {
        let dest = tempdir().unwrap();
        let monitor = Monitor::new(dest.path(), Box::new(ZipArchiver::default()));
        let err = monitor.preflight().unwrap_err();
        assert!(err.to_string().contains("No monitored paths"));
    }

    #[test]
    fn test_preflight_rejects_nested_destination() -> Result<()> {
        let a = source_tree("a")?;
        let monitor = Monitor::new(a.path().join("archive"), Box::new(ZipArchiver::default()))
            .with_paths([(a.path().to_path_buf(), String::new())]);
        let err = monitor.preflight().unwrap_err();
        assert!(err.to_string().contains("inside monitored path"));
        Ok(())
    }

    #[test]
    fn test_preflight_creates_destination() -> Result<()> {
        let a = source_tree("a")?;
        let root = tempdir()?;
        let dest = root.path().join("new/archive");
        let monitor = Monitor::new(&dest, Box::new(ZipArchiver::default()))
            .with_paths([(a.path().to_path_buf(), String::new())]);
        monitor.preflight()?;
        assert!(dest.is_dir());
        Ok(())
    }
}
