//! Cache entry definitions.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::Digest;

/// One file's metadata snapshot.
///
/// `name_hash` is derived from `path` alone and serves as the lookup key.
/// `body_hash` is only trusted while `timestamp` still equals the file's
/// current last-write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Digest of the absolute path string.
    pub name_hash: Digest,
    /// Last-write time, whole seconds since the Unix epoch (UTC).
    pub timestamp: i64,
    /// Digest of the file content.
    pub body_hash: Digest,
    /// Absolute path as scanned.
    pub path: PathBuf,
}

impl CacheEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(name_hash: Digest, timestamp: i64, body_hash: Digest, path: PathBuf) -> Self {
        Self {
            name_hash,
            timestamp,
            body_hash,
            path,
        }
    }

    /// Path of the file this entry describes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the cached body hash is still valid for `timestamp`.
    #[must_use]
    pub fn is_fresh(&self, timestamp: i64) -> bool {
        self.timestamp == timestamp
    }
}

/// Convert a modification time to whole UTC seconds since the epoch.
///
/// Sub-second precision is truncated toward negative infinity, so a file
/// touched within the same second keeps the same timestamp.
#[must_use]
pub fn unix_seconds(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp()
}
