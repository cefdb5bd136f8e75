//! dupsweep - incremental duplicate file finder
//!
//! Finds duplicate files across directory trees by content. A persistent,
//! per-target hash cache means repeated runs only re-hash files whose
//! timestamp changed. Duplicates are written to a plain-text report and can
//! be deleted under mask-driven retention rules.

pub mod actions;
pub mod cache;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod mask;
pub mod output;
pub mod progress;
pub mod runner;
pub mod scanner;
pub mod signal;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bytesize::ByteSize;
use chrono::{DateTime, Utc};

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::ExitCode;
use crate::progress::Progress;
use crate::runner::{inspect, RunOutcome, Runner};

/// Directory of the running executable, used in cache fingerprints.
///
/// Falls back to the working directory when the executable path is unknown.
#[must_use]
pub fn base_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default()
}

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error for configuration, cache, scan and report failures.
/// Configuration failures carry a [`config::ConfigError`] in their chain.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Scan(ref args) => {
            let config = Config::load(cli.config.as_deref(), &args.overrides())?;
            run_scan(config, cli.quiet)
        }
        Commands::Inspect(ref args) => {
            let config = Config::load(cli.config.as_deref(), &args.overrides())?;
            run_inspect(&config)
        }
    }
}

fn run_scan(config: Config, quiet: bool) -> anyhow::Result<ExitCode> {
    let shutdown = signal::install_handler().context("installing Ctrl+C handler")?;
    let show_progress = !quiet && std::io::stderr().is_terminal();

    let runner = Runner::new(config, base_dir(), shutdown)
        .with_progress(Arc::new(Progress::new(!show_progress)));

    match runner.run()? {
        RunOutcome::Completed(summary) => {
            for target in &summary.targets {
                log::info!(
                    "{}: {} files ({} reused, {} hashed from {}, {} skipped)",
                    target.target.display(),
                    target.entries,
                    target.reused,
                    target.hashed,
                    ByteSize(target.bytes_hashed),
                    target.skipped.len()
                );
            }
            if let Some(ref deletion) = summary.deletion {
                log::info!("{}", deletion.summary());
            }
            log::info!(
                "Done: {} duplicate group(s), {} redundant file(s)",
                summary.grouping.duplicate_groups,
                summary.grouping.redundant_files
            );
            Ok(ExitCode::Success)
        }
        RunOutcome::Cancelled(targets) => {
            let scanned: usize = targets.iter().map(|t| t.entries).sum();
            log::warn!("Cancelled after scanning {scanned} file(s)");
            Ok(ExitCode::Cancelled)
        }
    }
}

fn run_inspect(config: &Config) -> anyhow::Result<ExitCode> {
    for report in inspect(config, &base_dir())? {
        let size = std::fs::metadata(&report.cache_path)
            .map(|m| m.len())
            .unwrap_or(0);
        let newest = report
            .newest_timestamp
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .map_or_else(|| "-".to_string(), |dt| dt.to_rfc3339());

        println!("{}", report.target.display());
        println!("  cache:   {}", report.cache_path.display());
        if report.exists {
            println!("  entries: {} ({})", report.entries, ByteSize(size));
            println!("  newest:  {newest}");
        } else {
            println!("  entries: none (no cache yet)");
        }
    }
    Ok(ExitCode::Success)
}
