//! Command-line interface definitions.
//!
//! Every scan flag is optional and only overrides the layered configuration
//! (see [`crate::config`]) when given.
//!
//! # Example
//!
//! ```bash
//! # Scan two trees and write duplicates.txt
//! dupsweep scan ~/photos /mnt/backup/photos
//!
//! # Delete copies under the backup tree, keeping at least one copy per group
//! dupsweep scan ~/photos /mnt/backup/photos --delete --delete-mask '/mnt/backup/*' --keep-single
//!
//! # Show what the cache holds for a target
//! dupsweep inspect ~/photos
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;

/// Incremental duplicate file finder with a persistent hash cache.
#[derive(Debug, Parser)]
#[command(name = "dupsweep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print errors to stderr as JSON
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (TOML); defaults to ./dupsweep.toml when present
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan targets, report duplicates, and optionally delete copies
    Scan(ScanArgs),
    /// Show cache locations and entry counts for targets
    Inspect(InspectArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directories to scan
    #[arg(value_name = "TARGET")]
    pub targets: Vec<PathBuf>,

    /// Wildcard matched against file names (e.g. "*.jpg")
    #[arg(short, long, value_name = "MASK")]
    pub pattern: Option<String>,

    /// Directory for cache and lock files
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Path of the duplicates report
    #[arg(short, long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Cancel the run after this long (e.g. 90, 30s, 15m, 2h)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_secs)]
    pub timeout: Option<u64>,

    /// Delete duplicates selected by --delete-mask
    #[arg(long)]
    pub delete: bool,

    /// Mask selecting duplicates to delete (repeatable, applied in order)
    #[arg(long = "delete-mask", value_name = "MASK")]
    pub delete_masks: Vec<String>,

    /// Mask excluding paths from duplicate detection (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "MASK")]
    pub exclude_masks: Vec<String>,

    /// When a mask matches a whole group, keep its first file
    #[arg(long)]
    pub keep_single: bool,

    /// Number of targets scanned concurrently
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Follow symbolic links during scan
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Abort on the first unreadable file instead of skipping it
    #[arg(long)]
    pub strict: bool,

    /// Start from an empty cache if a cache file is corrupt
    #[arg(long)]
    pub discard_corrupt_cache: bool,

    /// Move deleted files to the system trash
    #[arg(long)]
    pub trash: bool,

    /// Log what would be deleted without deleting
    #[arg(long)]
    pub dry_run: bool,
}

impl ScanArgs {
    /// Flags that were given, as a configuration layer.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            targets: self.targets.clone(),
            search_pattern: self.pattern.clone(),
            cache_dir: self.cache_dir.clone(),
            duplicates_report: self.report.clone(),
            execution_timeout_secs: self.timeout,
            delete_duplicates: flag(self.delete),
            deletion_masks: self.delete_masks.clone(),
            exclusion_masks: self.exclude_masks.clone(),
            keep_single_file: flag(self.keep_single),
            io_threads: self.io_threads,
            follow_symlinks: flag(self.follow_symlinks),
            strict: flag(self.strict),
            discard_corrupt_cache: flag(self.discard_corrupt_cache),
            use_trash: flag(self.trash),
            dry_run: flag(self.dry_run),
        }
    }
}

/// Arguments for the inspect subcommand.
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Targets to inspect (defaults to the configured targets)
    #[arg(value_name = "TARGET")]
    pub targets: Vec<PathBuf>,

    /// Directory for cache and lock files
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

impl InspectArgs {
    /// Flags that were given, as a configuration layer.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            targets: self.targets.clone(),
            cache_dir: self.cache_dir.clone(),
            ..Overrides::default()
        }
    }
}

/// An absent boolean flag leaves lower layers alone.
fn flag(set: bool) -> Option<bool> {
    set.then_some(true)
}

/// Parse a duration into whole seconds.
///
/// Accepts a plain number of seconds or a number with an `s`, `m`, `h` or
/// `d` suffix.
///
/// # Errors
///
/// Returns an error message for empty, zero, or malformed values.
pub fn parse_duration_secs(s: &str) -> Result<u64, String> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err("Empty duration".to_string());
    }

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num, unit) = s.split_at(split);

    let value: u64 = num
        .parse()
        .map_err(|_| format!("Invalid duration: '{s}'"))?;
    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        other => return Err(format!("Unknown duration unit: '{other}'")),
    };

    match value.checked_mul(multiplier) {
        Some(0) => Err("Duration must be greater than zero".to_string()),
        Some(secs) => Ok(secs),
        None => Err(format!("Duration too large: '{s}'")),
    }
}
