//! On-disk cache store for one target root.
//!
//! Each target gets its own cache file, named after a fingerprint of the
//! process base directory and the target path. Changing either produces a
//! different file; stale files are left in place.
//!
//! # Layout
//!
//! ```text
//! <cache_dir>/<fingerprint>.bin    bincode envelope with the entry list
//! <cache_dir>/<fingerprint>.lock   exclusively locked while a run owns the store
//! ```
//!
//! The envelope carries a magic tag, a format version and a SHA-256 checksum
//! of the payload bytes. Saves go through a temporary sibling file that is
//! synced and renamed over the previous cache, so an interrupted save leaves
//! either the old or the new snapshot intact.

use std::collections::HashMap;
use std::fs::{self, File, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

use super::CacheEntry;
use crate::scanner::Digest;

/// Magic tag at the start of every cache file.
pub const CACHE_MAGIC: [u8; 4] = *b"DSWP";

/// Current on-disk format version.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Errors raised by the cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Another process (or another store in this process) holds the lock.
    #[error("cache is locked by another run: {0}")]
    Locked(PathBuf),

    /// The cache file exists but cannot be trusted.
    #[error("cache file is corrupt: {path}: {reason}")]
    Corrupt {
        /// Path of the cache file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// I/O failure while creating, reading or writing cache files.
    #[error("cache I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    magic: [u8; 4],
    format_version: u32,
    /// SHA-256 hex of `payload`.
    checksum: String,
    payload: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachePayload {
    base_dir: String,
    target: String,
    entries: Vec<CacheEntry>,
}

/// Compute the cache fingerprint for a base directory and one or more targets.
///
/// The result is the SHA-256 hex of `base_dir`, `?`, and the targets joined
/// by `?`. It is stable across runs and platforms with the same path strings.
#[must_use]
pub fn fingerprint(base_dir: &Path, targets: &[&Path]) -> String {
    let joined = targets
        .iter()
        .map(|t| t.to_string_lossy())
        .collect::<Vec<_>>()
        .join("?");
    let key = format!("{}?{}", base_dir.to_string_lossy(), joined);
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

/// Exclusively owned cache for one target root.
///
/// The lock is released when the store is dropped.
#[derive(Debug)]
pub struct CacheStore {
    fingerprint: String,
    cache_path: PathBuf,
    lock_path: PathBuf,
    base_dir: PathBuf,
    target: PathBuf,
    _lock: File,
}

impl CacheStore {
    /// Open (or create) the cache for `target` under `cache_dir`.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Locked`] if another store holds the lock
    /// - [`CacheError::Io`] if the directory or lock file cannot be created
    pub fn open(cache_dir: &Path, base_dir: &Path, target: &Path) -> CacheResult<Self> {
        fs::create_dir_all(cache_dir).map_err(|e| io_error(cache_dir, e))?;

        let fingerprint = fingerprint(base_dir, &[target]);
        let cache_path = cache_dir.join(format!("{fingerprint}.bin"));
        let lock_path = cache_dir.join(format!("{fingerprint}.lock"));

        let lock = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| io_error(&lock_path, e))?;

        match lock.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(CacheError::Locked(cache_path)),
            Err(TryLockError::Error(e)) => return Err(io_error(&lock_path, e)),
        }

        log::info!("Open file cache: {}", cache_path.display());

        Ok(Self {
            fingerprint,
            cache_path,
            lock_path,
            base_dir: base_dir.to_path_buf(),
            target: target.to_path_buf(),
            _lock: lock,
        })
    }

    /// Fingerprint this store was opened under.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Path of the data file.
    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Path of the lock file.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Target root this store belongs to.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Load the entries saved by the previous run.
    ///
    /// A missing or empty file yields an empty list.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Corrupt`] if the file cannot be decoded, fails its
    ///   checksum, or belongs to a different base directory or target
    /// - [`CacheError::Io`] if the file exists but cannot be read
    pub fn load(&self) -> CacheResult<Vec<CacheEntry>> {
        let bytes = match fs::read(&self.cache_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.cache_path, e)),
        };
        if bytes.is_empty() {
            return Ok(Vec::new());
        }

        let envelope: CacheEnvelope =
            bincode::deserialize(&bytes).map_err(|e| self.corrupt(format!("undecodable: {e}")))?;

        if envelope.magic != CACHE_MAGIC {
            return Err(self.corrupt("not a cache file".to_string()));
        }
        if envelope.format_version != CACHE_FORMAT_VERSION {
            return Err(self.corrupt(format!(
                "unsupported format version {} (expected {})",
                envelope.format_version, CACHE_FORMAT_VERSION
            )));
        }

        let checksum = format!("{:x}", Sha256::digest(&envelope.payload));
        if checksum != envelope.checksum {
            return Err(self.corrupt("checksum mismatch".to_string()));
        }

        let payload: CachePayload = bincode::deserialize(&envelope.payload)
            .map_err(|e| self.corrupt(format!("undecodable payload: {e}")))?;

        if payload.base_dir != self.base_dir.to_string_lossy()
            || payload.target != self.target.to_string_lossy()
        {
            return Err(self.corrupt(format!(
                "belongs to base dir `{}` and target `{}`",
                payload.base_dir, payload.target
            )));
        }

        log::debug!(
            "Loaded {} cached entries from {}",
            payload.entries.len(),
            self.cache_path.display()
        );
        Ok(payload.entries)
    }

    /// Build a lookup keyed by name hash. Later duplicates win.
    #[must_use]
    pub fn index(entries: Vec<CacheEntry>) -> HashMap<Digest, CacheEntry> {
        entries
            .into_iter()
            .map(|entry| (entry.name_hash, entry))
            .collect()
    }

    /// Persist the full entry list, replacing the previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the snapshot cannot be written, or
    /// [`CacheError::Corrupt`] if an entry cannot be encoded (for example a
    /// path that is not valid UTF-8).
    pub fn save(&self, entries: &[CacheEntry]) -> CacheResult<()> {
        let payload = PayloadRef {
            base_dir: self.base_dir.to_string_lossy().into_owned(),
            target: self.target.to_string_lossy().into_owned(),
            entries,
        };
        let payload = bincode::serialize(&payload)
            .map_err(|e| self.corrupt(format!("cannot encode entries: {e}")))?;

        let envelope = CacheEnvelope {
            magic: CACHE_MAGIC,
            format_version: CACHE_FORMAT_VERSION,
            checksum: format!("{:x}", Sha256::digest(&payload)),
            payload,
        };
        let bytes = bincode::serialize(&envelope)
            .map_err(|e| self.corrupt(format!("cannot encode envelope: {e}")))?;

        let tmp_path = self.cache_path.with_extension("bin.tmp");
        {
            let mut file = File::create(&tmp_path).map_err(|e| io_error(&tmp_path, e))?;
            file.write_all(&bytes).map_err(|e| io_error(&tmp_path, e))?;
            file.sync_all().map_err(|e| io_error(&tmp_path, e))?;
        }
        fs::rename(&tmp_path, &self.cache_path).map_err(|e| io_error(&self.cache_path, e))?;

        log::debug!(
            "Saved {} entries to {}",
            entries.len(),
            self.cache_path.display()
        );
        Ok(())
    }

    fn corrupt(&self, reason: String) -> CacheError {
        CacheError::Corrupt {
            path: self.cache_path.clone(),
            reason,
        }
    }
}

/// Borrowing twin of [`CachePayload`] so saves don't clone the entry list.
#[derive(Serialize)]
struct PayloadRef<'a> {
    base_dir: String,
    target: String,
    entries: &'a [CacheEntry],
}

fn io_error(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}
