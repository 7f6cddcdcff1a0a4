//! Run locking.
//!
//! Two processes checking the same database would archive every change twice
//! and race on the record store, so `check` and `watch` hold an exclusive
//! lock on a file in the database directory for as long as they run. The lock is released when
//! the guard is dropped, and the kernel drops it if the process dies.

use anyhow::{Context, Result, bail};
use fs4::fs_std::FileExt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Name of the run lock file inside the database directory.
pub const RUN_LOCK_FILE: &str = "backupd.lock";

/// Exclusive lock held by a running `check` or `watch`.
pub struct RunLock {
    /// Lock file handle
    lock_file: File,
    /// Path to the lock file (for error messages)
    lock_path: PathBuf,
}

impl RunLock {
    /// Acquire the run lock for the database in `db_dir`.
    ///
    /// The holder's pid and start time are written into the file for
    /// diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database directory cannot be created
    /// - Another process holds the lock after a short retry window
    pub fn acquire(db_dir: &Path) -> Result<Self> {
        fs::create_dir_all(db_dir).with_context(|| {
            format!("Failed to create database directory: {}", db_dir.display())
        })?;
        let lock_path = db_dir.join(RUN_LOCK_FILE);

        let timeout = if cfg!(test) {
            Duration::from_millis(100)
        } else {
            Duration::from_secs(1)
        };
        let retry_interval = Duration::from_millis(10);
        let start = Instant::now();

        // Never truncate before locking: the current holder's info lives there
        let lock_file = File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        loop {
            match lock_file.try_lock_exclusive() {
                Ok(true) => break,
                Ok(false) | Err(_) if start.elapsed() < timeout => {
                    std::thread::sleep(retry_interval);
                }
                Ok(false) | Err(_) => {
                    let holder = fs::read_to_string(&lock_path).unwrap_or_default();
                    bail!(
                        "Another backupd process is already using this database ({}). \
                         Lock file: {}",
                        holder.split_whitespace().collect::<Vec<_>>().join(", "),
                        lock_path.display()
                    );
                }
            }
        }

        let mut lock = Self {
            lock_file,
            lock_path,
        };
        lock.write_holder_info();
        Ok(lock)
    }

    fn write_holder_info(&mut self) {
        let _ = self.lock_file.set_len(0);
        let _ = writeln!(
            self.lock_file,
            "pid={}\nstarted={}",
            std::process::id(),
            humantime::format_rfc3339_seconds(SystemTime::now())
        );
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}
