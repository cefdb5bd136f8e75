use dupsweep::cache::CacheStore;
use dupsweep::config::Config;
use dupsweep::mask::MaskMatcher;
use dupsweep::progress::ProgressCallback;
use dupsweep::runner::{RunOutcome, Runner};
use dupsweep::scanner::{Digest, IncrementalScanner, ScanError, ScannerConfig, WalkerConfig};
use dupsweep::signal::ShutdownHandler;
use filetime::FileTime;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

fn scanner(config: ScannerConfig) -> IncrementalScanner {
    IncrementalScanner::new(config, Arc::new(MaskMatcher::new()))
}

fn write(path: &Path, content: &[u8]) {
    File::create(path).unwrap().write_all(content).unwrap();
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let outcome = scanner(ScannerConfig::default())
        .scan(dir.path(), HashMap::new())
        .unwrap();

    assert!(outcome.entries.is_empty());
    assert!(!outcome.changed);
    assert!(!outcome.cancelled);
}

#[test]
fn test_scan_nested_tree_in_path_order() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("b/c")).unwrap();
    write(&dir.path().join("z.txt"), b"z");
    write(&dir.path().join("b/c/y.txt"), b"y");
    write(&dir.path().join("b/x.txt"), b"x");

    let outcome = scanner(ScannerConfig::default())
        .scan(dir.path(), HashMap::new())
        .unwrap();

    let paths: Vec<_> = outcome.entries.iter().map(|e| e.path.clone()).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
    assert_eq!(paths.len(), 3);
    assert!(paths.iter().all(|p| p.is_absolute()));
}

#[test]
fn test_search_pattern_is_case_insensitive() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("A.JPG"), b"1");
    write(&dir.path().join("b.jpg"), b"2");
    write(&dir.path().join("c.png"), b"3");

    let config = ScannerConfig::default().with_walker_config(WalkerConfig::new("*.jpg", false));
    let outcome = scanner(config).scan(dir.path(), HashMap::new()).unwrap();
    assert_eq!(outcome.entries.len(), 2);
}

#[test]
fn test_rehash_after_touch_with_identical_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    write(&path, b"stable");
    filetime::set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

    let s = scanner(ScannerConfig::default());
    let first = s.scan(dir.path(), HashMap::new()).unwrap();

    filetime::set_file_mtime(&path, FileTime::from_unix_time(1_600_000_060, 0)).unwrap();
    let second = s.scan(dir.path(), CacheStore::index(first.entries.clone())).unwrap();

    assert_eq!(second.hashed, 1);
    assert!(second.changed);
    assert_eq!(second.entries[0].body_hash, first.entries[0].body_hash);
    assert_eq!(second.entries[0].timestamp, 1_600_000_060);
}

#[test]
fn test_stale_hash_reused_when_timestamp_kept() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.txt");
    write(&path, b"before");
    filetime::set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

    let s = scanner(ScannerConfig::default());
    let first = s.scan(dir.path(), HashMap::new()).unwrap();

    write(&path, b"after!");
    filetime::set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    let second = s.scan(dir.path(), CacheStore::index(first.entries)).unwrap();

    assert_eq!(second.reused, 1);
    assert_eq!(second.entries[0].body_hash, Digest::from(blake3::hash(b"before")));
}

#[test]
fn test_root_that_is_a_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("file.txt");
    write(&path, b"x");

    let result = scanner(ScannerConfig::default()).scan(&path, HashMap::new());
    assert!(matches!(result, Err(ScanError::NotADirectory(_))));
}

struct CancelAt {
    at: usize,
    flag: Arc<AtomicBool>,
}

impl ProgressCallback for CancelAt {
    fn on_phase_start(&self, _phase: &str, _total: usize) {}

    fn on_progress(&self, _phase: &str, current: usize, _path: &str) {
        if current == self.at {
            self.flag.store(true, Ordering::SeqCst);
        }
    }

    fn on_phase_end(&self, _phase: &str) {}
}

#[test]
fn test_partial_run_durability() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("t");
    fs::create_dir(&target).unwrap();
    for i in 0..6 {
        write(&target.join(format!("f{i}.txt")), format!("file {i}").as_bytes());
    }

    let cache_dir = dir.path().join("cache");
    let store = CacheStore::open(&cache_dir, dir.path(), &target).unwrap();

    // Seed the cache with f0..f3 only.
    let seed = scanner(ScannerConfig::default())
        .scan(&target, HashMap::new())
        .unwrap();
    let seeded: Vec<_> = seed.entries[..4].to_vec();
    store.save(&seeded).unwrap();

    // Touch everything, then cancel after three files.
    for i in 0..6 {
        filetime::set_file_mtime(
            target.join(format!("f{i}.txt")),
            FileTime::from_unix_time(1_400_000_000, 0),
        )
        .unwrap();
    }
    let flag = Arc::new(AtomicBool::new(false));
    let config = ScannerConfig::default()
        .with_shutdown_flag(Arc::clone(&flag))
        .with_progress_callback(Arc::new(CancelAt {
            at: 3,
            flag: Arc::clone(&flag),
        }));
    let outcome = scanner(config)
        .scan(&target, CacheStore::index(store.load().unwrap()))
        .unwrap();
    assert!(outcome.cancelled);
    store.save(&outcome.persistable_entries()).unwrap();

    let persisted = CacheStore::index(store.load().unwrap());
    // f0..f2 carry the new timestamp, f3 keeps its old state, f4 and f5 never existed.
    assert_eq!(persisted.len(), 4);
    for entry in &seeded[..3] {
        assert_eq!(persisted[&entry.name_hash].timestamp, 1_400_000_000);
    }
    assert_eq!(persisted[&seeded[3].name_hash], seeded[3]);
}

#[test]
fn test_cancelled_run_persists_updated_and_prior_entries() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("t");
    fs::create_dir(&target).unwrap();
    for i in 0..6 {
        write(&target.join(format!("f{i}.txt")), format!("file {i}").as_bytes());
    }
    let cache_dir = dir.path().join("cache");
    let config = Config {
        targets: vec![target.clone()],
        cache_dir: cache_dir.clone(),
        duplicates_report: dir.path().join("dups.txt"),
        io_threads: 1,
        ..Config::default()
    };

    let first = Runner::new(config.clone(), dir.path().to_path_buf(), ShutdownHandler::new())
        .run()
        .unwrap();
    assert!(matches!(first, RunOutcome::Completed(_)));
    let prior = CacheStore::open(&cache_dir, dir.path(), &target)
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(prior.len(), 6);

    for i in 0..6 {
        filetime::set_file_mtime(
            target.join(format!("f{i}.txt")),
            FileTime::from_unix_time(1_400_000_000, 0),
        )
        .unwrap();
    }

    // Cancel after two of the six files.
    let shutdown = ShutdownHandler::new();
    let second = Runner::new(config, dir.path().to_path_buf(), shutdown.clone())
        .with_progress(Arc::new(CancelAt {
            at: 2,
            flag: shutdown.get_flag(),
        }))
        .run()
        .unwrap();
    let RunOutcome::Cancelled(targets) = second else {
        panic!("expected a cancelled run");
    };
    assert!(targets[0].saved);
    assert_eq!(targets[0].entries, 2);

    let persisted = CacheStore::open(&cache_dir, dir.path(), &target)
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(persisted.len(), 6);
    let updated: Vec<_> = persisted
        .iter()
        .filter(|e| e.timestamp == 1_400_000_000)
        .collect();
    assert_eq!(updated.len(), 2);
    for entry in &prior[2..] {
        assert!(persisted.contains(entry), "{} lost", entry.path.display());
    }
}
