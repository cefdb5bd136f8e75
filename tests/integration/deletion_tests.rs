use dupsweep::config::Config;
use dupsweep::runner::{RunOutcome, RunSummary, Runner};
use dupsweep::signal::ShutdownHandler;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

struct Setup {
    root: TempDir,
    data: PathBuf,
}

fn setup(files: &[(&str, &str)]) -> Setup {
    let root = tempdir().unwrap();
    let data = root.path().join("data");
    fs::create_dir_all(&data).unwrap();
    for (name, content) in files {
        let path = data.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    Setup { root, data }
}

fn config(s: &Setup, masks: &[&str], keep_single: bool) -> Config {
    Config {
        targets: vec![s.data.clone()],
        cache_dir: s.root.path().join("cache"),
        duplicates_report: s.root.path().join("dups.txt"),
        delete_duplicates: true,
        deletion_masks: masks.iter().map(ToString::to_string).collect(),
        keep_single_file: keep_single,
        ..Config::default()
    }
}

fn run(config: Config, base: &Path) -> RunSummary {
    match Runner::new(config, base.to_path_buf(), ShutdownHandler::new())
        .run()
        .unwrap()
    {
        RunOutcome::Completed(summary) => summary,
        RunOutcome::Cancelled(_) => panic!("unexpected cancellation"),
    }
}

#[test]
fn test_subset_rule_deletes_only_matches() {
    let s = setup(&[("a.txt", "same"), ("a.bak", "same"), ("a.tmp", "same")]);
    run(config(&s, &["*.bak"], false), s.root.path());

    assert!(s.data.join("a.txt").exists());
    assert!(!s.data.join("a.bak").exists());
    assert!(s.data.join("a.tmp").exists());
}

#[test]
fn test_full_match_with_keep_single_leaves_one() {
    let s = setup(&[("x.tmp", "same"), ("y.tmp", "same")]);
    run(config(&s, &["*.tmp"], true), s.root.path());

    let survivors = ["x.tmp", "y.tmp"]
        .iter()
        .filter(|n| s.data.join(n).exists())
        .count();
    assert_eq!(survivors, 1);
    // The first member in path order is kept.
    assert!(s.data.join("x.tmp").exists());
}

#[test]
fn test_full_match_without_keep_single_deletes_nothing() {
    let s = setup(&[("x.tmp", "same"), ("y.tmp", "same")]);
    let summary = run(config(&s, &["*.tmp"], false), s.root.path());

    assert_eq!(summary.planned_deletions, 0);
    assert!(s.data.join("x.tmp").exists());
    assert!(s.data.join("y.tmp").exists());
}

#[test]
fn test_delete_disabled_keeps_files() {
    let s = setup(&[("a.txt", "same"), ("a.bak", "same")]);
    let mut cfg = config(&s, &["*.bak"], false);
    cfg.delete_duplicates = false;
    let summary = run(cfg, s.root.path());

    assert!(summary.deletion.is_none());
    assert!(s.data.join("a.bak").exists());
}

#[test]
fn test_dry_run_keeps_files() {
    let s = setup(&[("a.txt", "same"), ("a.bak", "same")]);
    let mut cfg = config(&s, &["*.bak"], false);
    cfg.dry_run = true;
    let summary = run(cfg, s.root.path());

    let deletion = summary.deletion.unwrap();
    assert_eq!(deletion.would_delete.len(), 1);
    assert!(s.data.join("a.bak").exists());
}

#[test]
fn test_excluded_paths_are_never_deleted() {
    let s = setup(&[
        ("keep/a.txt", "same"),
        ("vault/a.txt", "same"),
        ("junk/a.txt", "same"),
    ]);
    let mut cfg = config(&s, &["*/junk/*"], false);
    cfg.exclusion_masks = vec!["*/vault/*".into()];
    let summary = run(cfg, s.root.path());

    assert_eq!(summary.grouping.excluded, 1);
    assert!(s.data.join("vault/a.txt").exists());
    assert!(s.data.join("keep/a.txt").exists());
    assert!(!s.data.join("junk/a.txt").exists());
}

#[test]
fn test_rescan_after_deletion_prunes_cache() {
    let s = setup(&[("a.txt", "same"), ("a.bak", "same")]);
    run(config(&s, &["*.bak"], false), s.root.path());

    let mut cfg = config(&s, &["*.bak"], false);
    cfg.delete_duplicates = false;
    let summary = run(cfg, s.root.path());

    assert_eq!(summary.targets[0].entries, 1);
    assert!(summary.targets[0].saved);
    assert_eq!(summary.grouping.duplicate_groups, 0);
}

#[test]
fn test_nested_targets_never_delete_the_only_copy() {
    let s = setup(&[("sub/only.tmp", "unique content"), ("other.txt", "else")]);
    let mut cfg = config(&s, &["*.tmp"], true);
    cfg.targets = vec![s.data.clone(), s.data.join("sub")];
    let summary = run(cfg, s.root.path());

    assert_eq!(summary.targets.len(), 2);
    assert_eq!(summary.grouping.repeated_paths, 1);
    assert_eq!(summary.grouping.duplicate_groups, 0);
    assert_eq!(summary.planned_deletions, 0);
    assert!(s.data.join("sub/only.tmp").exists());
    assert!(!s.root.path().join("dups.txt").exists());
}

#[test]
fn test_nested_targets_keep_real_duplicates() {
    let s = setup(&[("sub/copy.tmp", "same"), ("orig.txt", "same")]);
    let mut cfg = config(&s, &["*.tmp"], true);
    cfg.targets = vec![s.data.clone(), s.data.join("sub")];
    let summary = run(cfg, s.root.path());

    assert_eq!(summary.grouping.duplicate_groups, 1);
    assert_eq!(summary.planned_deletions, 1);
    assert!(s.data.join("orig.txt").exists());
    assert!(!s.data.join("sub/copy.tmp").exists());
}
