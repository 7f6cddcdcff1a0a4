mod common;

use anyhow::Result;
use backupd::archive::{Archiver, ZipArchiver};
use backupd::config::CompressionMethod;
use backupd::utils::hash::hash_directory;
use common::{unpack, write_tree};
use rstest::rstest;
use std::fs;
use tempfile::TempDir;

#[rstest]
#[case::deflate(CompressionMethod::Deflate, None)]
#[case::deflate_best(CompressionMethod::Deflate, Some(9))]
#[case::zstd(CompressionMethod::Zstd, Some(3))]
#[case::stored(CompressionMethod::Stored, None)]
fn test_unpacked_archive_hashes_identically(
    #[case] method: CompressionMethod,
    #[case] level: Option<i64>,
) -> Result<()> {
    let src = TempDir::new()?;
    let blob = "\u{1}\u{2}\u{3}".repeat(5000);
    write_tree(
        src.path(),
        &[
            ("README", "top level"),
            ("docs/guide.md", "# Guide\n"),
            ("docs/img/blob.bin", blob.as_str()),
            ("empty.txt", ""),
        ],
    )?;
    fs::create_dir_all(src.path().join("cache/empty"))?;
    let dest = TempDir::new()?;

    let record = ZipArchiver::new(method, level).write(src.path(), dest.path())?;

    let unpacked = TempDir::new()?;
    unpack(&record.destination_file, unpacked.path())?;
    assert_eq!(hash_directory(src.path())?, hash_directory(unpacked.path())?);
    Ok(())
}

#[test]
fn test_archive_name_identifies_source() -> Result<()> {
    let root = TempDir::new()?;
    let src = root.path().join("photos");
    write_tree(&src, &[("cat.jpg", "meow")])?;
    let dest = TempDir::new()?;

    let record = ZipArchiver::default().write(&src, dest.path())?;
    let name = record
        .destination_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    assert!(name.starts_with("photos-"), "unexpected name {name}");
    assert!(name.ends_with(".zip"));
    Ok(())
}

#[test]
fn test_same_basename_different_sources_do_not_collide() -> Result<()> {
    let root = TempDir::new()?;
    let one = root.path().join("one/data");
    let two = root.path().join("two/data");
    write_tree(&one, &[("x", "1")])?;
    write_tree(&two, &[("x", "2")])?;
    let dest = TempDir::new()?;

    let archiver = ZipArchiver::default();
    let a = archiver.write(&one, dest.path())?;
    let b = archiver.write(&two, dest.path())?;
    assert_ne!(a.destination_file, b.destination_file);
    assert_eq!(fs::read_dir(dest.path())?.count(), 2);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_leaves_no_archive() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if common::running_as_root() {
        return Ok(());
    }
    let src = TempDir::new()?;
    write_tree(src.path(), &[("a.txt", "a"), ("z.txt", "z")])?;
    let locked = src.path().join("z.txt");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;
    let dest = TempDir::new()?;

    let result = ZipArchiver::default().write(src.path(), dest.path());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644))?;

    assert!(result.is_err());
    assert_eq!(fs::read_dir(dest.path())?.count(), 0);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_fifo_is_left_out_of_archive() -> Result<()> {
    let src = TempDir::new()?;
    write_tree(src.path(), &[("a.txt", "a"), ("sub/b.txt", "b")])?;
    common::make_fifo(&src.path().join("sub/pipe"))?;
    let dest = TempDir::new()?;

    let source = src.path().to_path_buf();
    let destination = dest.path().to_path_buf();
    let record = common::within(std::time::Duration::from_secs(5), move || {
        ZipArchiver::default().write(&source, &destination)
    })??;

    // sub/, a.txt, sub/b.txt
    assert_eq!(record.entries, 3);
    let unpacked = TempDir::new()?;
    unpack(&record.destination_file, unpacked.path())?;
    assert_eq!(hash_directory(src.path())?, hash_directory(unpacked.path())?);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_non_utf8_name_fails_explicitly() -> Result<()> {
    use backupd::error::ErrorKind;
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let src = TempDir::new()?;
    write_tree(src.path(), &[("a.txt", "a")])?;
    fs::write(src.path().join(OsStr::from_bytes(b"bad\xff")), "x")?;
    let dest = TempDir::new()?;

    let err = ZipArchiver::default()
        .write(src.path(), dest.path())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArchiveWriteFailed);
    assert!(err.to_string().contains("not valid UTF-8"));
    assert_eq!(fs::read_dir(dest.path())?.count(), 0);
    Ok(())
}
