use dupsweep::config::Config;
use dupsweep::output::ReportStatus;
use dupsweep::runner::{RunOutcome, Runner};
use dupsweep::signal::ShutdownHandler;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_report_lifecycle() {
    let root = tempdir().unwrap();
    let data = root.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("a.txt"), b"same").unwrap();
    fs::write(data.join("b.txt"), b"same").unwrap();
    fs::write(data.join("c.txt"), b"unique").unwrap();

    let report = root.path().join("dups.txt");
    let config = Config {
        targets: vec![data.clone()],
        cache_dir: root.path().join("cache"),
        duplicates_report: report.clone(),
        ..Config::default()
    };
    let runner = Runner::new(config.clone(), root.path().to_path_buf(), ShutdownHandler::new());

    let RunOutcome::Completed(summary) = runner.run().unwrap() else {
        panic!("cancelled");
    };
    assert_eq!(summary.report, ReportStatus::Written(1));
    let expected = format!(
        "---\n{}\n{}\n",
        data.join("a.txt").display(),
        data.join("b.txt").display()
    );
    assert_eq!(fs::read_to_string(&report).unwrap(), expected);

    // Remove the duplicate; the next run deletes the stale report.
    fs::remove_file(data.join("b.txt")).unwrap();
    let RunOutcome::Completed(summary) = runner.run().unwrap() else {
        panic!("cancelled");
    };
    assert_eq!(summary.report, ReportStatus::Removed);
    assert!(!report.exists());
}

#[test]
fn test_report_is_overwritten() {
    let root = tempdir().unwrap();
    let data = root.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("a.txt"), b"same").unwrap();
    fs::write(data.join("b.txt"), b"same").unwrap();

    let report = root.path().join("dups.txt");
    fs::write(&report, "---\n/old/path\n/old/other\n").unwrap();

    let config = Config {
        targets: vec![data],
        cache_dir: root.path().join("cache"),
        duplicates_report: report.clone(),
        ..Config::default()
    };
    Runner::new(config, root.path().to_path_buf(), ShutdownHandler::new())
        .run()
        .unwrap();

    let text = fs::read_to_string(&report).unwrap();
    assert!(!text.contains("/old/path"));
    assert_eq!(text.lines().filter(|l| *l == "---").count(), 1);
}
