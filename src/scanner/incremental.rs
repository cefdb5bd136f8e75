//! Incremental, cache-aware scan of one target root.
//!
//! # Overview
//!
//! [`IncrementalScanner::scan`] walks a target root and produces a fresh
//! snapshot of [`CacheEntry`] values. For every file it looks up the previous
//! run's entry by name hash:
//!
//! - same timestamp: the cached body hash is reused without reading content
//! - different timestamp: the content is re-hashed, even if byte-identical
//! - no previous entry: the content is hashed into a new entry
//!
//! The outcome reports whether anything was (re)computed, so callers can
//! skip rewriting an unchanged cache file.
//!
//! Cancellation is checked after each file. A hash that has started always
//! runs to completion.
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::cache::CacheStore;
//! use dupsweep::mask::MaskMatcher;
//! use dupsweep::scanner::{IncrementalScanner, ScannerConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let scanner = IncrementalScanner::new(ScannerConfig::default(), Arc::new(MaskMatcher::new()));
//! let outcome = scanner.scan(Path::new("/data"), CacheStore::index(Vec::new())).unwrap();
//! println!("{} files, {} hashed", outcome.entries.len(), outcome.hashed);
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{Digest, Hasher, ScanError, Walker, WalkerConfig};
use crate::cache::{unix_seconds, CacheEntry};
use crate::mask::MaskMatcher;
use crate::progress::ProgressCallback;

/// Configuration for an incremental scan.
#[derive(Clone, Default)]
pub struct ScannerConfig {
    /// Directory walking options (search pattern, symlinks)
    pub walker: WalkerConfig,
    /// Abort on the first unreadable file instead of skipping it
    pub strict: bool,
    /// Optional shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ScannerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerConfig")
            .field("walker", &self.walker)
            .field("strict", &self.strict)
            .field("shutdown_flag", &self.shutdown_flag)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl ScannerConfig {
    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, walker: WalkerConfig) -> Self {
        self.walker = walker;
        self
    }

    /// Enable strict mode (per-file errors abort the scan).
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// A file the scan could not process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Path of the file
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

/// Result of scanning one target root.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Entries for every file processed, in processing order.
    pub entries: Vec<CacheEntry>,
    /// Previously cached entries this scan did not revisit.
    ///
    /// After a complete scan these are files that disappeared. After a
    /// cancelled scan they also include files not reached yet.
    pub unvisited: Vec<CacheEntry>,
    /// Previously cached entries at or under a path that could not be read.
    ///
    /// Their state is unknown, so they are written back unchanged.
    pub retained: Vec<CacheEntry>,
    /// Whether the cache file needs rewriting.
    pub changed: bool,
    /// Whether the scan stopped early on a shutdown request.
    pub cancelled: bool,
    /// Files skipped because of per-file errors.
    pub skipped: Vec<SkippedFile>,
    /// Entries whose body hash was carried over.
    pub reused: usize,
    /// Entries whose body hash was computed by this scan.
    pub hashed: usize,
    /// Bytes streamed through the hasher.
    pub bytes_hashed: u64,
}

impl ScanOutcome {
    /// Entries to write back to the cache.
    ///
    /// A cancelled scan keeps the previous state of files it never reached,
    /// and any scan keeps the previous state of paths it could not read, so
    /// partial progress never discards older cache data.
    #[must_use]
    pub fn persistable_entries(&self) -> Vec<CacheEntry> {
        let mut entries = self.entries.clone();
        entries.extend(self.retained.iter().cloned());
        if self.cancelled {
            entries.extend(self.unvisited.iter().cloned());
        }
        entries
    }
}

/// Cache-aware scanner for a single target root.
pub struct IncrementalScanner {
    config: ScannerConfig,
    matcher: Arc<MaskMatcher>,
    hasher: Hasher,
}

impl IncrementalScanner {
    /// Create a new scanner.
    #[must_use]
    pub fn new(config: ScannerConfig, matcher: Arc<MaskMatcher>) -> Self {
        Self {
            config,
            matcher,
            hasher: Hasher::new(),
        }
    }

    /// Scan `target_root` against the previous run's index.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if the root is missing, not a directory or
    /// cannot be listed, or in strict mode when any file cannot be read.
    pub fn scan(
        &self,
        target_root: &Path,
        mut previous: HashMap<Digest, CacheEntry>,
    ) -> Result<ScanOutcome, ScanError> {
        let mut walker = Walker::new(
            target_root,
            self.config.walker.clone(),
            Arc::clone(&self.matcher),
        );
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        walker.validate_root()?;

        log::info!("Scanning target: {}", walker.root().display());

        let mut outcome = ScanOutcome::default();
        let (files, walk_errors) = walker.collect_sorted();

        let mut unreadable: Vec<PathBuf> = Vec::new();
        for error in walk_errors {
            if error.path() == walker.root() {
                log::error!("Cannot list target {}: {}", walker.root().display(), error);
                return Err(error);
            }
            unreadable.push(error.path().to_path_buf());
            self.skip_or_fail(&mut outcome, error)?;
        }

        if self.config.is_shutdown_requested() {
            log::info!("Scan of {} cancelled during enumeration", walker.root().display());
            outcome.cancelled = true;
            outcome.unvisited = into_sorted(previous);
            return Ok(outcome);
        }

        let phase = walker.root().to_string_lossy().into_owned();
        let total = files.len();
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(&phase, total);
        }

        let mut last_percent = None;
        for (idx, file) in files.iter().enumerate() {
            log::trace!("{}", file.path.display());

            match self.process_file(&file.path, &mut previous) {
                Ok(Processed::Reused(entry)) => {
                    outcome.reused += 1;
                    outcome.entries.push(entry);
                }
                Ok(Processed::Hashed(entry)) => {
                    outcome.hashed += 1;
                    outcome.bytes_hashed += file.size;
                    outcome.changed = true;
                    outcome.entries.push(entry);
                }
                Err(error) => {
                    unreadable.push(file.path.clone());
                    self.skip_or_fail(&mut outcome, error)?;
                }
            }

            let done = idx + 1;
            if let Some(ref callback) = self.config.progress_callback {
                callback.on_progress(&phase, done, file.path.to_string_lossy().as_ref());
            }
            let percent = done * 100 / total;
            if last_percent != Some(percent) && percent % 5 == 0 {
                last_percent = Some(percent);
                log::debug!("{}: {} %", phase, percent);
            }

            if self.config.is_shutdown_requested() {
                log::info!(
                    "Scan of {} cancelled after {} of {} files",
                    phase,
                    done,
                    total
                );
                outcome.cancelled = true;
                break;
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(&phase);
        }

        let (retained, unvisited): (Vec<_>, Vec<_>) = into_sorted(previous)
            .into_iter()
            .partition(|entry| unreadable.iter().any(|p| entry.path.starts_with(p)));
        if !retained.is_empty() {
            log::debug!(
                "{}: keeping {} cached entries under unreadable paths",
                phase,
                retained.len()
            );
        }
        outcome.retained = retained;
        outcome.unvisited = unvisited;
        if !outcome.cancelled && !outcome.unvisited.is_empty() {
            log::debug!(
                "{}: {} cached entries no longer present",
                phase,
                outcome.unvisited.len()
            );
            outcome.changed = true;
        }

        log::info!(
            "Scanned {}: {} files ({} reused, {} hashed, {} skipped)",
            phase,
            outcome.entries.len(),
            outcome.reused,
            outcome.hashed,
            outcome.skipped.len()
        );

        Ok(outcome)
    }

    /// Build the entry for one file, reusing the previous body hash when the
    /// timestamp is unchanged.
    fn process_file(
        &self,
        path: &Path,
        previous: &mut HashMap<Digest, CacheEntry>,
    ) -> Result<Processed, ScanError> {
        if path.to_str().is_none() {
            return Err(ScanError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "path is not valid UTF-8",
                ),
            });
        }

        let name_hash = self.hasher.name_hash(path);
        let metadata = if self.config.walker.follow_symlinks {
            std::fs::metadata(path)
        } else {
            std::fs::symlink_metadata(path)
        }
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(path.to_path_buf()),
            _ => ScanError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let timestamp = metadata.modified().map(unix_seconds).unwrap_or(0);

        let fresh = previous
            .get(&name_hash)
            .map(|cached| cached.is_fresh(timestamp));
        if fresh == Some(true) {
            if let Some(entry) = previous.remove(&name_hash) {
                return Ok(Processed::Reused(entry));
            }
        }

        // Hash before touching the index so a failed read leaves the old
        // entry in place to be retained.
        let body_hash = self.hasher.body_hash(path)?;
        let entry = match previous.remove(&name_hash) {
            Some(mut entry) => {
                log::trace!(
                    "Timestamp changed ({} -> {}), re-hashed: {}",
                    entry.timestamp,
                    timestamp,
                    path.display()
                );
                entry.timestamp = timestamp;
                entry.body_hash = body_hash;
                entry.path = path.to_path_buf();
                entry
            }
            None => CacheEntry::new(name_hash, timestamp, body_hash, path.to_path_buf()),
        };
        Ok(Processed::Hashed(entry))
    }

    fn skip_or_fail(&self, outcome: &mut ScanOutcome, error: ScanError) -> Result<(), ScanError> {
        if self.config.strict {
            return Err(error);
        }
        log::warn!("Skipping {}: {}", error.path().display(), error);
        outcome.skipped.push(SkippedFile {
            path: error.path().to_path_buf(),
            reason: error.to_string(),
        });
        Ok(())
    }
}

enum Processed {
    Reused(CacheEntry),
    Hashed(CacheEntry),
}

fn into_sorted(map: HashMap<Digest, CacheEntry>) -> Vec<CacheEntry> {
    let mut entries: Vec<_> = map.into_values().collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}
