use dupsweep::config::Config;
use dupsweep::runner::{RunOutcome, Runner};
use dupsweep::signal::ShutdownHandler;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tempfile::tempdir;

fn run(config: Config, base: PathBuf) -> dupsweep::runner::RunSummary {
    match Runner::new(config, base, ShutdownHandler::new()).run().unwrap() {
        RunOutcome::Completed(summary) => summary,
        RunOutcome::Cancelled(_) => panic!("unexpected cancellation"),
    }
}

#[test]
fn test_duplicates_across_targets() {
    let root = tempdir().unwrap();
    let dir1 = root.path().join("one");
    let dir2 = root.path().join("two");
    fs::create_dir_all(&dir1).unwrap();
    fs::create_dir_all(&dir2).unwrap();

    File::create(dir1.join("a.txt"))
        .unwrap()
        .write_all(b"dup")
        .unwrap();
    File::create(dir2.join("b.txt"))
        .unwrap()
        .write_all(b"dup")
        .unwrap();

    let config = Config {
        targets: vec![dir1.clone(), dir2.clone()],
        cache_dir: root.path().join("cache"),
        duplicates_report: root.path().join("dups.txt"),
        io_threads: 2,
        ..Config::default()
    };
    let summary = run(config, root.path().to_path_buf());

    assert_eq!(summary.targets.len(), 2);
    assert_eq!(summary.grouping.duplicate_groups, 1);
    assert_ne!(summary.targets[0].cache_path, summary.targets[1].cache_path);

    let report = fs::read_to_string(root.path().join("dups.txt")).unwrap();
    assert!(report.contains("a.txt"));
    assert!(report.contains("b.txt"));
}

#[test]
fn test_repeated_target_is_scanned_once() {
    let root = tempdir().unwrap();
    let dir = root.path().join("one");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("a.txt"), b"x").unwrap();

    let config = Config {
        targets: vec![dir.clone(), dir.clone()],
        cache_dir: root.path().join("cache"),
        duplicates_report: root.path().join("dups.txt"),
        ..Config::default()
    };
    let summary = run(config, root.path().to_path_buf());

    assert_eq!(summary.targets.len(), 1);
    assert_eq!(summary.grouping.duplicate_groups, 0);
}

#[test]
fn test_targets_keep_configuration_order() {
    let root = tempdir().unwrap();
    let dirs: Vec<PathBuf> = (0..4).map(|i| root.path().join(format!("t{i}"))).collect();
    for (i, d) in dirs.iter().enumerate() {
        fs::create_dir_all(d).unwrap();
        fs::write(d.join("f.txt"), format!("unique {i}")).unwrap();
    }

    let config = Config {
        targets: dirs.clone(),
        cache_dir: root.path().join("cache"),
        duplicates_report: root.path().join("dups.txt"),
        io_threads: 3,
        ..Config::default()
    };
    let summary = run(config, root.path().to_path_buf());

    let order: Vec<PathBuf> = summary.targets.iter().map(|t| t.target.clone()).collect();
    assert_eq!(order, dirs);
}

fn write_targets(root: &std::path::Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let dir = root.join(format!("target{i}"));
            fs::create_dir_all(dir.join("nested")).unwrap();
            fs::write(dir.join("shared.txt"), b"same everywhere").unwrap();
            fs::write(dir.join("nested").join(format!("own{i}.txt")), format!("own {i}")).unwrap();
            dir
        })
        .collect()
}

#[test]
fn test_more_targets_than_io_threads() {
    let root = tempdir().unwrap();
    let targets = write_targets(root.path(), 3);

    let config = Config {
        targets: targets.clone(),
        cache_dir: root.path().join("cache"),
        duplicates_report: root.path().join("dups.txt"),
        io_threads: 1,
        ..Config::default()
    };
    let summary = run(config, root.path().to_path_buf());

    assert_eq!(summary.targets.len(), 3);
    for target in &summary.targets {
        assert_eq!(target.entries, 2, "{}", target.target.display());
        assert!(target.skipped.is_empty(), "{:?}", target.skipped);
    }
    assert_eq!(summary.grouping.duplicate_groups, 1);
    assert_eq!(summary.grouping.redundant_files, 2);
}

#[test]
fn test_single_io_thread_rescan_keeps_cache_and_report() {
    let root = tempdir().unwrap();
    let targets = write_targets(root.path(), 2);
    let report = root.path().join("dups.txt");

    let mut config = Config {
        targets,
        cache_dir: root.path().join("cache"),
        duplicates_report: report.clone(),
        io_threads: 4,
        ..Config::default()
    };
    let first = run(config.clone(), root.path().to_path_buf());
    assert_eq!(first.grouping.duplicate_groups, 1);

    config.io_threads = 1;
    let second = run(config, root.path().to_path_buf());

    assert_eq!(second.grouping.duplicate_groups, 1);
    for target in &second.targets {
        assert_eq!(target.entries, 2);
        assert_eq!(target.reused, 2);
        assert!(!target.saved);
    }
    assert!(report.exists());
}
