#![allow(dead_code)]

use anyhow::Result;
use backupd::BackupContext;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Sandbox with a config file, a record store and an archive directory
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub ctx: BackupContext,
}

impl TestEnv {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join(".config/backupd/config.toml");

        let mut ctx = BackupContext::new_explicit(config_path)?;
        ctx.override_paths(
            Some(&temp_dir.path().join("db")),
            Some(&temp_dir.path().join("archive")),
        );
        fs::create_dir_all(ctx.archive_dir())?;

        Ok(Self { temp_dir, ctx })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a source directory `name` populated with `files`
    pub fn source(&self, name: &str, files: &[(&str, &str)]) -> Result<PathBuf> {
        let root = self.path().join("sources").join(name);
        fs::create_dir_all(&root)?;
        write_tree(&root, files)?;
        Ok(root.canonicalize()?)
    }

    /// Number of files in the archive directory
    pub fn archive_count(&self) -> Result<usize> {
        Ok(fs::read_dir(self.ctx.archive_dir())?.count())
    }
}

/// Write `(relative path, content)` pairs below `root`, creating parents
pub fn write_tree(root: &Path, files: &[(&str, &str)]) -> Result<()> {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

/// Unpack a zip archive into `into`
pub fn unpack(archive: &Path, into: &Path) -> Result<()> {
    let mut zip = zip::ZipArchive::new(fs::File::open(archive)?)?;
    zip.extract(into)?;
    Ok(())
}

/// Whether the tests run with root privileges (permission checks are moot)
#[cfg(unix)]
pub fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions
    unsafe { libc::geteuid() == 0 }
}

/// Create a named pipe at `path`
#[cfg(unix)]
pub fn make_fifo(path: &Path) -> Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())?;
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call
    if unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

/// Run `f` on a helper thread, failing if it has not returned within `limit`
pub fn within<T: Send + 'static>(
    limit: std::time::Duration,
    f: impl FnOnce() -> T + Send + 'static,
) -> Result<T> {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(limit)
        .map_err(|_| anyhow::anyhow!("did not finish within {limit:?}"))
}
