use dupsweep::cache::{CacheEntry, CacheError, CacheStore};
use dupsweep::scanner::Digest;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn sample() -> Vec<CacheEntry> {
    vec![CacheEntry::new(
        Digest::from_bytes([1; 32]),
        42,
        Digest::from_bytes([2; 32]),
        PathBuf::from("/t/a"),
    )]
}

#[test]
fn test_garbage_file_is_corrupt() {
    let dir = tempdir().unwrap();
    let store = CacheStore::open(dir.path(), dir.path(), Path::new("/t")).unwrap();
    fs::write(store.cache_path(), b"not a cache file").unwrap();

    assert!(matches!(store.load(), Err(CacheError::Corrupt { .. })));
}

#[test]
fn test_truncated_file_is_corrupt() {
    let dir = tempdir().unwrap();
    let store = CacheStore::open(dir.path(), dir.path(), Path::new("/t")).unwrap();
    store.save(&sample()).unwrap();

    let bytes = fs::read(store.cache_path()).unwrap();
    fs::write(store.cache_path(), &bytes[..bytes.len() / 2]).unwrap();

    assert!(matches!(store.load(), Err(CacheError::Corrupt { .. })));
}

#[test]
fn test_cache_from_other_target_is_corrupt() {
    let dir = tempdir().unwrap();
    let a = CacheStore::open(dir.path(), dir.path(), Path::new("/a")).unwrap();
    let b = CacheStore::open(dir.path(), dir.path(), Path::new("/b")).unwrap();
    a.save(&sample()).unwrap();

    fs::copy(a.cache_path(), b.cache_path()).unwrap();
    assert!(matches!(b.load(), Err(CacheError::Corrupt { .. })));
}

#[test]
fn test_empty_file_loads_empty() {
    let dir = tempdir().unwrap();
    let store = CacheStore::open(dir.path(), dir.path(), Path::new("/t")).unwrap();
    fs::write(store.cache_path(), b"").unwrap();
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn test_stale_tmp_file_is_ignored() {
    let dir = tempdir().unwrap();
    let store = CacheStore::open(dir.path(), dir.path(), Path::new("/t")).unwrap();
    store.save(&sample()).unwrap();

    let mut tmp = store.cache_path().as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(PathBuf::from(tmp), b"half-written").unwrap();

    assert_eq!(store.load().unwrap(), sample());
}
