//! Content fingerprints for directory subtrees.
//!
//! The digest covers relative paths and file contents only. Modification
//! times and permission bits are deliberately left out so that copying or
//! restoring a tree does not register as a change.
//!
//! Only directories, regular files and symlinks take part. FIFOs, sockets
//! and device nodes are skipped without being opened, matching what the
//! archive writers store.

use crate::error::MonitorError;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, span};
use walkdir::WalkDir;

/// Read buffer size used when streaming file contents.
const READ_BUFFER_SIZE: usize = 65536;

/// Entry tags fed into the accumulator ahead of each relative path.
const TAG_DIR: &[u8] = b"D\0";
const TAG_FILE: &[u8] = b"F\0";
const TAG_LINK: &[u8] = b"L\0";

/// Hex-encoded SHA-256 of a byte slice.
#[must_use]
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Kind of entry found while walking a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
    Symlink,
}

/// A walked entry, keyed by its path relative to the hashed root.
#[derive(Debug)]
struct TreeEntry {
    relative: PathBuf,
    absolute: PathBuf,
    kind: EntryKind,
}

/// Computes deterministic digests of directory subtrees.
#[derive(Debug, Clone, Default)]
pub struct DirectoryHasher {
    /// Whether symbolic links are followed during traversal
    follow_symlinks: bool,
}

impl DirectoryHasher {
    /// Create a hasher.
    #[must_use]
    pub const fn new(follow_symlinks: bool) -> Self {
        Self { follow_symlinks }
    }

    /// Build a hasher from the `[hashing]` config table.
    #[must_use]
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(config.hashing.follow_symlinks)
    }

    /// Hash the subtree rooted at `root`.
    ///
    /// Entries are sorted by relative path before hashing, so the result does
    /// not depend on the order the filesystem hands them out.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::NotFound`] if `root` does not exist
    /// - [`MonitorError::PermissionDenied`] if any entry is unreadable
    /// - [`MonitorError::HashComputationFailed`] for other I/O failures, a
    ///   file that changes size mid-read, or a `root` that is not a directory
    ///
    /// No digest is produced when any entry fails.
    pub fn hash(&self, root: &Path) -> Result<String, MonitorError> {
        let span = span!(Level::DEBUG, "hash_directory", path = %root.display());
        let _guard = span.enter();

        let metadata = fs::metadata(root).map_err(|e| MonitorError::from_io(root, e))?;
        if !metadata.is_dir() {
            return Err(MonitorError::HashComputationFailed {
                path: root.to_path_buf(),
                source: std::io::Error::other("monitored path is not a directory"),
            });
        }

        let entries = self.collect_entries(root)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        let mut bytes_hashed: u64 = 0;

        for entry in &entries {
            let rel = relative_key_bytes(&entry.relative);
            match entry.kind {
                EntryKind::Dir => {
                    hasher.update(TAG_DIR);
                    hasher.update(&rel);
                    hasher.update(b"\0");
                }
                EntryKind::File => {
                    hasher.update(TAG_FILE);
                    hasher.update(&rel);
                    hasher.update(b"\0");
                    bytes_hashed += feed_file(&mut hasher, &mut buffer, &entry.absolute)?;
                }
                EntryKind::Symlink => {
                    let target = fs::read_link(&entry.absolute)
                        .map_err(|e| MonitorError::from_io(&entry.absolute, e))?;
                    hasher.update(TAG_LINK);
                    hasher.update(&rel);
                    hasher.update(b"\0");
                    let target = target.as_os_str().as_encoded_bytes();
                    hasher.update((target.len() as u64).to_le_bytes());
                    hasher.update(target);
                }
            }
        }

        let digest = format!("{:x}", hasher.finalize());
        debug!(
            entries = entries.len(),
            bytes = bytes_hashed,
            digest = %digest,
            "Directory hashed"
        );
        Ok(digest)
    }

    /// Walk `root` and return every hashable entry below it, sorted by
    /// relative path.
    fn collect_entries(&self, root: &Path) -> Result<Vec<TreeEntry>, MonitorError> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(root)
            .min_depth(1)
            .follow_links(self.follow_symlinks)
        {
            let entry = entry.map_err(|e| MonitorError::from_walkdir(root, e))?;
            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                EntryKind::Dir
            } else if file_type.is_symlink() {
                EntryKind::Symlink
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                debug!(path = %entry.path().display(), "Skipping special file");
                continue;
            };
            let relative = entry
                .path()
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| entry.path().to_path_buf());

            entries.push(TreeEntry {
                relative,
                absolute: entry.into_path(),
                kind,
            });
        }

        entries.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(entries)
    }
}

/// Feed a file's length and contents into `hasher`, returning its size.
///
/// The length is taken up front; a file that grows or shrinks before the
/// read finishes is reported instead of hashed.
fn feed_file(hasher: &mut Sha256, buffer: &mut [u8], path: &Path) -> Result<u64, MonitorError> {
    let mut file = File::open(path).map_err(|e| MonitorError::from_io(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| MonitorError::from_io(path, e))?
        .len();
    hasher.update(len.to_le_bytes());

    let mut total = 0u64;
    loop {
        let bytes_read = file
            .read(buffer)
            .map_err(|e| MonitorError::from_io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        total += bytes_read as u64;
        if total > len {
            break;
        }
    }

    if total != len {
        return Err(MonitorError::HashComputationFailed {
            path: path.to_path_buf(),
            source: std::io::Error::other(format!(
                "file changed size while hashing ({len} -> {total}+ bytes)"
            )),
        });
    }

    Ok(total)
}

/// Relative path as raw bytes joined with `/`, independent of platform.
///
/// Names are taken byte for byte, so two names that differ only in invalid
/// UTF-8 sequences still hash differently.
#[must_use]
pub fn relative_key_bytes(relative: &Path) -> Vec<u8> {
    let mut key = Vec::new();
    for (i, component) in relative.components().enumerate() {
        if i > 0 {
            key.push(b'/');
        }
        key.extend_from_slice(component.as_os_str().as_encoded_bytes());
    }
    key
}

/// Relative path rendered with `/` separators, or `None` if any component
/// is not valid UTF-8.
#[must_use]
pub fn relative_key(relative: &Path) -> Option<String> {
    relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()
        .map(|parts| parts.join("/"))
}

/// Hash `root` with default settings.
///
/// # Errors
///
/// See [`DirectoryHasher::hash`].
pub fn hash_directory(root: &Path) -> Result<String, MonitorError> {
    DirectoryHasher::default().hash(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_hash_bytes() {
        let hash1 = hash_bytes(b"Hello, World!");
        let hash2 = hash_bytes(b"Hello, World!");
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, hash_bytes(b"Different data"));
    }

    #[test]
    fn test_empty_directory_is_stable() -> Result<()> {
        let dir = tempdir()?;
        let hash1 = hash_directory(dir.path())?;
        let hash2 = hash_directory(dir.path())?;
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
        Ok(())
    }

    #[test]
    fn test_empty_subdirectory_changes_digest() -> Result<()> {
        let dir = tempdir()?;
        let before = hash_directory(dir.path())?;
        fs::create_dir(dir.path().join("empty"))?;
        assert_ne!(before, hash_directory(dir.path())?);
        Ok(())
    }

    #[test]
    fn test_change_past_first_buffer_is_detected() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("big.bin"), vec![7u8; READ_BUFFER_SIZE * 2 + 17])?;
        let first = hash_directory(dir.path())?;

        let mut bytes = vec![7u8; READ_BUFFER_SIZE * 2 + 17];
        bytes[READ_BUFFER_SIZE] = 8;
        fs::write(dir.path().join("big.bin"), bytes)?;
        assert_ne!(first, hash_directory(dir.path())?);
        Ok(())
    }

    #[test]
    fn test_moving_content_between_files_changes_digest() -> Result<()> {
        // "ab" + "c" must not collide with "a" + "bc"
        let dir = tempdir()?;
        fs::write(dir.path().join("1"), b"ab")?;
        fs::write(dir.path().join("2"), b"c")?;
        let first = hash_directory(dir.path())?;

        fs::write(dir.path().join("1"), b"a")?;
        fs::write(dir.path().join("2"), b"bc")?;
        assert_ne!(first, hash_directory(dir.path())?);
        Ok(())
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let dir = tempdir().unwrap();
        let err = hash_directory(&dir.path().join("gone")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_file_root_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x")?;
        let err = hash_directory(&file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HashComputationFailed);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_target_is_hashed() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.txt"), b"a")?;
        fs::write(dir.path().join("b.txt"), b"b")?;
        std::os::unix::fs::symlink("a.txt", dir.path().join("link"))?;
        let first = hash_directory(dir.path())?;

        fs::remove_file(dir.path().join("link"))?;
        std::os::unix::fs::symlink("b.txt", dir.path().join("link"))?;
        assert_ne!(first, hash_directory(dir.path())?);
        Ok(())
    }

    #[test]
    fn test_relative_key_uses_forward_slashes() {
        let rel = Path::new("a").join("b").join("c.txt");
        assert_eq!(relative_key(&rel).as_deref(), Some("a/b/c.txt"));
        assert_eq!(relative_key_bytes(&rel), b"a/b/c.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_key_rejects_invalid_utf8() {
        use std::os::unix::ffi::OsStrExt;
        let rel = Path::new("a").join(std::ffi::OsStr::from_bytes(b"b\xff"));
        assert_eq!(relative_key(&rel), None);
        assert_eq!(relative_key_bytes(&rel), b"a/b\xff");
    }
}
