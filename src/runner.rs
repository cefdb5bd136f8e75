//! Run orchestration.
//!
//! # Overview
//!
//! A run sequences the components across every configured target:
//!
//! 1. open and lock one [`CacheStore`] per target, then load it
//! 2. scan the targets concurrently (up to `io_threads` at a time)
//! 3. save every cache whose snapshot changed
//! 4. group all entries by content and write the duplicates report
//! 5. plan and execute deletions when enabled
//!
//! A shutdown request (Ctrl+C or the execution timeout) stops scanning at
//! the next file boundary. Caches are still saved and the run ends as
//! [`RunOutcome::Cancelled`] without detection, report or deletion.
//!
//! All stores, and therefore all locks, live until the run returns.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use thiserror::Error;

use crate::actions::{self, plan_deletions, BatchDeleteResult, DeleteConfig};
use crate::cache::{CacheEntry, CacheError, CacheStore};
use crate::config::{Config, ConfigError};
use crate::duplicates::{find_duplicates, GroupingStats};
use crate::mask::MaskMatcher;
use crate::output::{write_report, ReportError, ReportStatus};
use crate::progress::ProgressCallback;
use crate::scanner::{
    IncrementalScanner, ScanError, ScanOutcome, ScannerConfig, SkippedFile, WalkerConfig,
};
use crate::signal::{spawn_timeout, ShutdownHandler};

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A cache could not be opened, loaded or saved.
    #[error("cache for {target}: {source}")]
    Cache {
        /// Target the cache belongs to
        target: PathBuf,
        /// Underlying cache failure
        #[source]
        source: CacheError,
    },

    /// A target could not be scanned.
    #[error("scanning {target}: {source}")]
    Scan {
        /// Target whose scan failed
        target: PathBuf,
        /// Underlying scan failure
        #[source]
        source: ScanError,
    },

    /// The duplicates report could not be written.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// The scan thread pool could not be created.
    #[error("failed to build scan thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Per-target results.
#[derive(Debug, Clone)]
pub struct TargetSummary {
    /// Absolute target root
    pub target: PathBuf,
    /// Cache file backing this target
    pub cache_path: PathBuf,
    /// Entries in the fresh snapshot
    pub entries: usize,
    /// Entries whose hash was reused
    pub reused: usize,
    /// Entries hashed by this run
    pub hashed: usize,
    /// Bytes read to compute new hashes
    pub bytes_hashed: u64,
    /// Files skipped because of errors
    pub skipped: Vec<SkippedFile>,
    /// Whether the cache file was rewritten
    pub saved: bool,
    /// Whether the scan stopped early
    pub cancelled: bool,
}

/// Results of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    /// One entry per target, in configuration order
    pub targets: Vec<TargetSummary>,
    /// Grouping statistics
    pub grouping: GroupingStats,
    /// What happened to the report file
    pub report: ReportStatus,
    /// Number of planned deletions
    pub planned_deletions: usize,
    /// Deletion results, when deletion ran
    pub deletion: Option<BatchDeleteResult>,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every step ran.
    Completed(RunSummary),
    /// Scanning was cancelled; partial caches were saved.
    Cancelled(Vec<TargetSummary>),
}

/// Cache location and contents for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectReport {
    /// Absolute target root
    pub target: PathBuf,
    /// Cache file path
    pub cache_path: PathBuf,
    /// Whether the cache file exists
    pub exists: bool,
    /// Number of cached entries
    pub entries: usize,
    /// Most recent file timestamp in the cache
    pub newest_timestamp: Option<i64>,
}

/// Sequences scanning, detection, reporting and deletion.
pub struct Runner {
    config: Config,
    base_dir: PathBuf,
    shutdown: ShutdownHandler,
    progress: Option<Arc<dyn ProgressCallback>>,
    matcher: Arc<MaskMatcher>,
}

impl Runner {
    /// Create a runner.
    ///
    /// `base_dir` is part of every cache fingerprint, so separate
    /// installations keep separate caches.
    #[must_use]
    pub fn new(config: Config, base_dir: PathBuf, shutdown: ShutdownHandler) -> Self {
        Self {
            config,
            base_dir,
            shutdown,
            progress: None,
            matcher: Arc::new(MaskMatcher::new()),
        }
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Execute the run.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] for invalid configuration, cache failures, fatal
    /// scan errors and report I/O failures. Deletion failures are reported
    /// in the summary instead.
    pub fn run(&self) -> Result<RunOutcome, RunError> {
        self.config.validate()?;

        let _timeout = self
            .config
            .execution_timeout_secs
            .map(|secs| spawn_timeout(&self.shutdown, Duration::from_secs(secs)));

        let targets = unique_targets(&self.config.targets);
        let jobs = self.open_stores(&targets)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads)
            .thread_name(|i| format!("dupsweep-scan-{i}"))
            .build()?;

        log::info!(
            "Scanning {} target(s) with {} thread(s)",
            jobs.len(),
            self.config.io_threads
        );

        let results: Vec<(CacheStore, Result<ScanOutcome, ScanError>)> = pool.install(|| {
            jobs.into_par_iter()
                .map(|(store, previous)| {
                    let outcome = self
                        .scanner()
                        .scan(store.target(), CacheStore::index(previous));
                    (store, outcome)
                })
                .collect()
        });

        // Save every successful target before reporting a failed one, so
        // finished work is kept.
        let mut summaries = Vec::with_capacity(results.len());
        let mut entries: Vec<CacheEntry> = Vec::new();
        let mut first_error = None;
        let mut cancelled = false;
        let mut stores = Vec::with_capacity(results.len());

        for (store, result) in results {
            match result {
                Ok(outcome) => {
                    let saved = match save_if_changed(&store, &outcome) {
                        Ok(saved) => saved,
                        Err(error) => {
                            log::error!("{}", error);
                            first_error.get_or_insert(error);
                            false
                        }
                    };
                    cancelled |= outcome.cancelled;
                    summaries.push(TargetSummary {
                        target: store.target().to_path_buf(),
                        cache_path: store.cache_path().to_path_buf(),
                        entries: outcome.entries.len(),
                        reused: outcome.reused,
                        hashed: outcome.hashed,
                        bytes_hashed: outcome.bytes_hashed,
                        skipped: outcome.skipped,
                        saved,
                        cancelled: outcome.cancelled,
                    });
                    entries.extend(outcome.entries);
                }
                Err(source) => {
                    log::error!("Scan of {} failed: {}", store.target().display(), source);
                    if first_error.is_none() {
                        first_error = Some(RunError::Scan {
                            target: store.target().to_path_buf(),
                            source,
                        });
                    }
                }
            }
            stores.push(store);
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        if cancelled || self.shutdown.is_shutdown_requested() {
            log::warn!("Run cancelled; scanned state was saved, nothing else was done");
            return Ok(RunOutcome::Cancelled(summaries));
        }

        log::info!("Searching duplicates ...");
        let (groups, grouping) =
            find_duplicates(&entries, &self.config.exclusion_masks, &self.matcher);
        if groups.is_empty() {
            log::info!("No duplicates found");
        } else {
            log::info!(
                "Duplicates found: {} group(s), {} redundant file(s)",
                grouping.duplicate_groups,
                grouping.redundant_files
            );
        }

        let report = write_report(&self.config.duplicates_report, &groups)?;

        let mut planned_deletions = 0;
        let mut deletion = None;
        if self.config.delete_duplicates && !self.config.deletion_masks.is_empty() {
            let plan = plan_deletions(
                &groups,
                &self.config.deletion_masks,
                self.config.keep_single_file,
                &self.matcher,
            );
            planned_deletions = plan.len();
            let delete_config = DeleteConfig {
                use_trash: self.config.use_trash,
                dry_run: self.config.dry_run,
                ..DeleteConfig::default()
            };
            deletion = Some(actions::execute(&plan, &delete_config));
        }

        drop(stores);

        Ok(RunOutcome::Completed(RunSummary {
            targets: summaries,
            grouping,
            report,
            planned_deletions,
            deletion,
        }))
    }

    fn scanner(&self) -> IncrementalScanner {
        let mut config = ScannerConfig::default()
            .with_walker_config(WalkerConfig::new(
                self.config.search_pattern.clone(),
                self.config.follow_symlinks,
            ))
            .with_strict(self.config.strict)
            .with_shutdown_flag(self.shutdown.get_flag());
        if let Some(ref progress) = self.progress {
            config = config.with_progress_callback(Arc::clone(progress));
        }
        IncrementalScanner::new(config, Arc::clone(&self.matcher))
    }

    /// Lock and load every store before any scanning starts.
    fn open_stores(&self, targets: &[PathBuf]) -> Result<Vec<(CacheStore, Vec<CacheEntry>)>, RunError> {
        let mut jobs = Vec::with_capacity(targets.len());
        for target in targets {
            let cache_err = |source| RunError::Cache {
                target: target.clone(),
                source,
            };
            let store = CacheStore::open(&self.config.cache_dir, &self.base_dir, target)
                .map_err(cache_err)?;
            let previous = match store.load() {
                Ok(entries) => entries,
                Err(CacheError::Corrupt { path, reason }) if self.config.discard_corrupt_cache => {
                    log::warn!(
                        "Discarding corrupt cache {} ({}); starting empty",
                        path.display(),
                        reason
                    );
                    Vec::new()
                }
                Err(e) => return Err(cache_err(e)),
            };
            log::debug!(
                "Cache {} (fingerprint {}) loaded with {} entries",
                store.cache_path().display(),
                store.fingerprint(),
                previous.len()
            );
            jobs.push((store, previous));
        }
        Ok(jobs)
    }
}

/// Report cache locations and contents for the configured targets.
///
/// # Errors
///
/// Returns [`RunError::Cache`] if a cache is locked by a running scan or
/// cannot be read.
pub fn inspect(config: &Config, base_dir: &Path) -> Result<Vec<InspectReport>, RunError> {
    if config.targets.is_empty() {
        return Err(ConfigError::NoTargets.into());
    }

    unique_targets(&config.targets)
        .into_iter()
        .map(|target| {
            let cache_err = |source| RunError::Cache {
                target: target.clone(),
                source,
            };
            let store = CacheStore::open(&config.cache_dir, base_dir, &target).map_err(cache_err)?;
            let entries = store.load().map_err(cache_err)?;
            Ok(InspectReport {
                cache_path: store.cache_path().to_path_buf(),
                exists: store.cache_path().exists(),
                entries: entries.len(),
                newest_timestamp: entries.iter().map(|e| e.timestamp).max(),
                target,
            })
        })
        .collect()
}

fn save_if_changed(store: &CacheStore, outcome: &ScanOutcome) -> Result<bool, RunError> {
    if !outcome.changed {
        log::debug!("Cache {} unchanged", store.cache_path().display());
        return Ok(false);
    }
    let entries = outcome.persistable_entries();
    store.save(&entries).map_err(|source| RunError::Cache {
        target: store.target().to_path_buf(),
        source,
    })?;
    log::info!(
        "Cache {} saved ({} entries)",
        store.cache_path().display(),
        entries.len()
    );
    Ok(true)
}

/// Absolute targets with repeats removed, in first-seen order.
fn unique_targets(targets: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = Vec::with_capacity(targets.len());
    for target in targets {
        let absolute = std::path::absolute(target).unwrap_or_else(|_| target.clone());
        if seen.contains(&absolute) {
            log::warn!("Target listed twice, scanning once: {}", absolute.display());
        } else {
            seen.push(absolute);
        }
    }
    for (outer, inner) in nested_targets(&seen) {
        log::warn!(
            "Target {} is inside target {}; its files are scanned twice but grouped once",
            inner.display(),
            outer.display()
        );
    }
    seen
}

/// Pairs `(outer, inner)` where `inner` lies inside `outer`.
fn nested_targets(targets: &[PathBuf]) -> Vec<(&Path, &Path)> {
    let mut nested = Vec::new();
    for outer in targets {
        for inner in targets {
            if inner != outer && inner.starts_with(outer) {
                nested.push((outer.as_path(), inner.as_path()));
            }
        }
    }
    nested
}
