//! The path record store.
//!
//! Records live in a single bincode file inside the database directory. Every
//! write goes to a temporary file in the same directory which is then renamed
//! over the old one, so readers only ever see a complete file. An advisory
//! lock on a sibling file serializes writers, which lets administrative
//! commands (`add`, `remove`) run while a watcher is persisting hashes.

use super::PathRecord;
use crate::utils::serialization;
use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Name of the records file inside the database directory.
pub const RECORDS_FILE: &str = "paths.bin";

/// Name of the lock file guarding [`RECORDS_FILE`].
pub const STORE_LOCK_FILE: &str = "paths.lock";

/// Handle on a record store directory.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

/// Held while the records file is being read or rewritten.
struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl RecordStore {
    /// Open (creating if needed) the store in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Directory backing this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the records file.
    #[must_use]
    pub fn records_path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILE)
    }

    fn lock(&self, exclusive: bool) -> Result<StoreLock> {
        let lock_path = self.dir.join(STORE_LOCK_FILE);
        let file = File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
        let locked = if exclusive {
            file.lock_exclusive()
        } else {
            file.lock_shared()
        };
        locked.with_context(|| format!("Failed to lock record store: {}", lock_path.display()))?;
        Ok(StoreLock { file })
    }

    /// Load every record, in insertion order.
    ///
    /// A store that has never been written is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is corrupt.
    pub fn load(&self) -> Result<Vec<PathRecord>> {
        let _lock = self.lock(false)?;
        self.read_records()
    }

    fn read_records(&self) -> Result<Vec<PathRecord>> {
        let path = self.records_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read(&path)
            .with_context(|| format!("Failed to read record store: {}", path.display()))?;
        if data.is_empty() {
            return Ok(Vec::new());
        }
        serialization::deserialize(&data)
            .with_context(|| format!("Corrupt record store: {}", path.display()))
    }

    fn write_records(&self, records: &[PathRecord]) -> Result<()> {
        let path = self.records_path();
        let data = serialization::serialize(&records).context("Failed to serialize records")?;

        let mut temp = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("Failed to create temp file in {}", self.dir.display()))?;
        temp.write_all(&data).context("Failed to write records")?;
        temp.as_file().sync_all().context("Failed to flush records")?;
        temp.persist(&path)
            .with_context(|| format!("Failed to replace record store: {}", path.display()))?;

        debug!(records = records.len(), path = %path.display(), "Record store written");
        Ok(())
    }

    /// Replace the whole store with `records`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be locked or written.
    pub fn save(&self, records: &[PathRecord]) -> Result<()> {
        let _lock = self.lock(true)?;
        self.write_records(records)
    }

    /// Register `path` with an empty hash.
    ///
    /// Returns `false` if the path was already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn add(&self, path: &Path) -> Result<bool> {
        let _lock = self.lock(true)?;
        let mut records = self.read_records()?;
        if records.iter().any(|r| r.path == path) {
            return Ok(false);
        }
        records.push(PathRecord::unchecked(path.to_path_buf()));
        self.write_records(&records)?;
        Ok(true)
    }

    /// Unregister `path`.
    ///
    /// Returns `false` if the path was not present.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn remove(&self, path: &Path) -> Result<bool> {
        let _lock = self.lock(true)?;
        let mut records = self.read_records()?;
        let before = records.len();
        records.retain(|r| r.path != path);
        if records.len() == before {
            return Ok(false);
        }
        self.write_records(&records)?;
        Ok(true)
    }

    /// Rewrite the hash of every stored record that appears in `hashes`.
    ///
    /// The file is re-read under the lock, so records added or removed by
    /// another process since startup are preserved as they are. Returns the
    /// number of records whose hash changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written. The file is
    /// left untouched in that case.
    pub fn apply_hashes(&self, hashes: &BTreeMap<PathBuf, String>) -> Result<usize> {
        let _lock = self.lock(true)?;
        let mut records = self.read_records()?;
        let mut updated = 0;

        for record in &mut records {
            if let Some(hash) = hashes.get(&record.path)
                && *hash != record.hash
            {
                record.hash.clone_from(hash);
                updated += 1;
            }
        }

        if updated > 0 {
            self.write_records(&records)?;
        }
        Ok(updated)
    }
}
