use super::{ArchiveFormat, ArchiveRecord, Archiver, archive_file_name};
use crate::config::CompressionMethod;
use crate::error::MonitorError;
use crate::utils::hash::relative_key;
use chrono::Utc;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{Level, debug, info, span};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod as ZipMethod, ZipWriter};

/// How many suffixed names are tried before giving up on a free file name.
const MAX_NAME_ATTEMPTS: u32 = 16;

/// Writes ZIP archives.
///
/// The archive is assembled in a hidden temporary file next to its final
/// location and renamed into place only once the container is complete, so a
/// failed run leaves nothing behind in the destination directory.
#[derive(Debug, Clone)]
pub struct ZipArchiver {
    /// Compression applied to each file entry
    method: CompressionMethod,
    /// Compression level, `None` for the method's default
    level: Option<i64>,
    /// Store link targets' contents instead of the links themselves
    follow_symlinks: bool,
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self::new(CompressionMethod::Deflate, None)
    }
}

impl ZipArchiver {
    /// Create an archiver using `method` at `level`.
    #[must_use]
    pub const fn new(method: CompressionMethod, level: Option<i64>) -> Self {
        Self {
            method,
            level,
            follow_symlinks: false,
        }
    }

    /// Follow symbolic links while packaging.
    #[must_use]
    pub const fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Base options for entries in the archive.
    fn file_options(&self) -> SimpleFileOptions {
        let options = SimpleFileOptions::default();
        match self.method {
            CompressionMethod::Stored => options.compression_method(ZipMethod::Stored),
            CompressionMethod::Deflate => options
                .compression_method(ZipMethod::Deflated)
                .compression_level(self.level),
            CompressionMethod::Zstd => options
                .compression_method(ZipMethod::Zstd)
                .compression_level(self.level),
        }
    }

    /// Package every entry below `source` into `writer`.
    ///
    /// FIFOs, sockets and device nodes are skipped without being opened.
    /// Names that are not valid UTF-8 fail the archive, since zip entry
    /// names cannot carry them faithfully. Returns the number of entries
    /// written.
    fn package(
        &self,
        source: &Path,
        writer: &mut ZipWriter<NamedTempFile>,
    ) -> Result<usize, MonitorError> {
        let base_options = self.file_options();
        let mut count = 0usize;

        for entry in WalkDir::new(source)
            .min_depth(1)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(source).to_path_buf();
                MonitorError::archive(
                    source,
                    format!("failed to traverse {}", path.display()),
                    io::Error::from(e),
                )
            })?;
            let file_type = entry.file_type();
            if !(file_type.is_dir() || file_type.is_symlink() || file_type.is_file()) {
                debug!(path = %entry.path().display(), "Skipping special file");
                continue;
            }

            let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
            let name = relative_key(relative).ok_or_else(|| MonitorError::ArchiveWriteFailed {
                path: source.to_path_buf(),
                reason: format!("entry name is not valid UTF-8: {}", relative.display()),
                source: None,
            })?;

            if file_type.is_dir() {
                writer
                    .add_directory(format!("{name}/"), base_options)
                    .map_err(|e| MonitorError::archive(source, format!("failed to add {name}/"), e))?;
            } else if file_type.is_symlink() {
                let target = fs::read_link(entry.path()).map_err(|e| {
                    MonitorError::archive(source, format!("failed to read link {name}"), e)
                })?;
                let target = target.to_str().ok_or_else(|| MonitorError::ArchiveWriteFailed {
                    path: source.to_path_buf(),
                    reason: format!("link target of {name} is not valid UTF-8"),
                    source: None,
                })?;
                writer
                    .add_symlink(name.as_str(), target, base_options)
                    .map_err(|e| MonitorError::archive(source, format!("failed to add {name}"), e))?;
            } else {
                self.add_file(source, entry.path(), &name, base_options, writer)?;
            }
            count += 1;
        }

        Ok(count)
    }

    /// Stream one regular file into the archive.
    fn add_file(
        &self,
        source: &Path,
        path: &Path,
        name: &str,
        base_options: SimpleFileOptions,
        writer: &mut ZipWriter<NamedTempFile>,
    ) -> Result<(), MonitorError> {
        let read_err =
            |e: io::Error| MonitorError::archive(source, format!("failed to read {name}"), e);

        let file = File::open(path).map_err(read_err)?;
        let metadata = file.metadata().map_err(read_err)?;

        let mut options = base_options.large_file(metadata.len() >= u64::from(u32::MAX));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            options = options.unix_permissions(metadata.permissions().mode());
        }

        writer
            .start_file(name, options)
            .map_err(|e| MonitorError::archive(source, format!("failed to add {name}"), e))?;
        io::copy(&mut BufReader::new(file), writer).map_err(read_err)?;
        Ok(())
    }

    /// Move the finished temporary file to a free name in `destination_dir`.
    fn persist(
        source: &Path,
        destination_dir: &Path,
        mut temp: NamedTempFile,
    ) -> Result<(PathBuf, chrono::DateTime<Utc>), MonitorError> {
        let created_at = Utc::now();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = archive_file_name(source, &created_at, ArchiveFormat::Zip, attempt);
            let target = destination_dir.join(name);
            match temp.persist_noclobber(&target) {
                Ok(_) => return Ok((target, created_at)),
                Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(path = %target.display(), "Archive name taken, retrying");
                    temp = err.file;
                }
                Err(err) => {
                    return Err(MonitorError::archive(
                        source,
                        format!("failed to move archive into {}", destination_dir.display()),
                        err.error,
                    ));
                }
            }
        }

        Err(MonitorError::ArchiveWriteFailed {
            path: source.to_path_buf(),
            reason: format!(
                "no free archive name in {} after {MAX_NAME_ATTEMPTS} attempts",
                destination_dir.display()
            ),
            source: None,
        })
    }
}

impl Archiver for ZipArchiver {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn write(&self, source: &Path, destination_dir: &Path) -> Result<ArchiveRecord, MonitorError> {
        let span = span!(Level::DEBUG, "archive", path = %source.display(), method = %self.method);
        let _guard = span.enter();

        let temp = tempfile::Builder::new()
            .prefix(".backupd-")
            .suffix(".partial")
            .tempfile_in(destination_dir)
            .map_err(|e| {
                MonitorError::archive(
                    source,
                    format!("cannot create file in {}", destination_dir.display()),
                    e,
                )
            })?;

        // Dropping `writer` (and with it the temp file) on any early return
        // below deletes the partial archive.
        let mut writer = ZipWriter::new(temp);
        let entries = self.package(source, &mut writer)?;
        let temp = writer
            .finish()
            .map_err(|e| MonitorError::archive(source, "failed to finalize archive", e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| MonitorError::archive(source, "failed to flush archive", e))?;

        let (destination_file, created_at) = Self::persist(source, destination_dir, temp)?;

        info!(
            archive = %destination_file.display(),
            entries,
            "Archive written"
        );

        Ok(ArchiveRecord {
            source_path: source.to_path_buf(),
            destination_file,
            created_at,
            format: ArchiveFormat::Zip,
            entries,
        })
    }
}
