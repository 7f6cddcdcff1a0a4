mod common;

use anyhow::Result;
use backupd::storage::{PathRecord, RecordStore};
use common::TestEnv;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

#[test]
fn test_store_reopens_with_same_records() -> Result<()> {
    let env = TestEnv::new()?;
    let store = env.ctx.store()?;
    store.save(&[
        PathRecord {
            path: PathBuf::from("/srv/a"),
            hash: "aa".to_string(),
        },
        PathRecord::unchecked(PathBuf::from("/srv/b")),
    ])?;

    let reopened = RecordStore::open(env.ctx.db_path())?;
    let records = reopened.load()?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].hash, "aa");
    assert!(records[1].is_unchecked());
    Ok(())
}

#[test]
fn test_concurrent_adds_are_all_kept() -> Result<()> {
    let env = TestEnv::new()?;
    let store = Arc::new(env.ctx.store()?);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.add(Path::new(&format!("/srv/{i}"))))
        })
        .collect();
    for handle in handles {
        assert!(handle.join().expect("thread panicked")?);
    }

    assert_eq!(store.load()?.len(), 8);
    Ok(())
}

#[test]
fn test_apply_hashes_ignores_removed_paths() -> Result<()> {
    let env = TestEnv::new()?;
    let store = env.ctx.store()?;
    store.add(Path::new("/srv/a"))?;
    store.add(Path::new("/srv/b"))?;

    let mut hashes = BTreeMap::new();
    hashes.insert(PathBuf::from("/srv/a"), "ha".to_string());
    hashes.insert(PathBuf::from("/srv/b"), "hb".to_string());

    // Removed by an administrator while a watcher was running
    store.remove(Path::new("/srv/b"))?;
    assert_eq!(store.apply_hashes(&hashes)?, 1);

    let records = store.load()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hash, "ha");
    Ok(())
}
