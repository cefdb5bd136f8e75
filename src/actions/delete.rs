//! Execution of a deletion plan.
//!
//! # Overview
//!
//! Planned files are removed one by one, either permanently or by moving
//! them to the system trash. Before a file is touched its current
//! last-write time is compared with the timestamp recorded at scan time; a
//! file modified in between is not deleted.
//!
//! A failure is recorded and the batch continues with the next file.
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::actions::delete::{permanent_delete, DeleteConfig};
//! use std::path::PathBuf;
//!
//! let path = PathBuf::from("/path/to/duplicate.txt");
//! match permanent_delete(&path) {
//!     Ok(result) => println!("Deleted: {}", result.path.display()),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use thiserror::Error;

use super::policy::DeletionPlan;
use crate::cache::unix_seconds;

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File was modified since it was scanned.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// File that could not be trashed
        path: PathBuf,
        /// Error reported by the trash backend
        message: String,
    },

    /// Permanent delete operation failed.
    #[error("permanent delete failed for {path}: {message}")]
    PermanentDeleteFailed {
        /// File that could not be removed
        path: PathBuf,
        /// Description of the failure
        message: String,
    },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File being deleted
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::Modified(p)
            | Self::TrashFailed { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }
}

/// Result of a successful deletion.
#[derive(Debug, Clone)]
pub struct DeleteResult {
    /// Path that was deleted.
    pub path: PathBuf,
    /// Size of the deleted file in bytes.
    pub size: u64,
    /// Whether deletion was permanent (true) or to trash (false).
    pub permanent: bool,
}

impl DeleteResult {
    /// Create a new delete result.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, permanent: bool) -> Self {
        Self {
            path,
            size,
            permanent,
        }
    }
}

/// Results of executing a plan.
#[derive(Debug, Default)]
pub struct BatchDeleteResult {
    /// Successfully deleted files.
    pub successes: Vec<DeleteResult>,
    /// Failed deletions.
    pub failures: Vec<DeleteError>,
    /// Files that would have been deleted in a dry run.
    pub would_delete: Vec<PathBuf>,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

impl BatchDeleteResult {
    /// Number of successful deletions.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed deletions.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if all deletions succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        if !self.would_delete.is_empty() {
            return format!("Dry run: would delete {} file(s)", self.would_delete.len());
        }
        if self.all_succeeded() {
            format!(
                "Deleted {} file(s), freed {}",
                self.success_count(),
                ByteSize(self.bytes_freed)
            )
        } else {
            format!(
                "Deleted {} file(s), {} failed, freed {}",
                self.success_count(),
                self.failure_count(),
                ByteSize(self.bytes_freed)
            )
        }
    }
}

/// Configuration for deletion operations.
#[derive(Debug, Clone)]
pub struct DeleteConfig {
    /// Move files to the system trash instead of removing them.
    pub use_trash: bool,
    /// Log the plan without deleting anything.
    pub dry_run: bool,
    /// Skip files whose timestamp changed since the scan.
    pub verify_timestamp: bool,
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            use_trash: false,
            dry_run: false,
            verify_timestamp: true,
        }
    }
}

impl DeleteConfig {
    /// Enable/disable dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

fn map_metadata_error(path: &Path, e: io::Error) -> DeleteError {
    match e.kind() {
        io::ErrorKind::NotFound => DeleteError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => DeleteError::PermissionDenied(path.to_path_buf()),
        _ => DeleteError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    }
}

/// Move a single file to the system trash.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if its metadata can't be read
/// - `TrashFailed` if the trash operation fails
pub fn delete_to_trash(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = fs::symlink_metadata(path)
        .map_err(|e| map_metadata_error(path, e))?
        .len();

    trash::delete(path).map_err(|e| {
        log::error!("Trash operation failed for {}: {}", path.display(), e);
        DeleteError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Moved to trash: {} ({})", path.display(), ByteSize(size));

    Ok(DeleteResult::new(path.to_path_buf(), size, false))
}

/// Permanently delete a single file.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if its metadata can't be read
/// - `PermanentDeleteFailed` if the delete operation fails
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = fs::symlink_metadata(path)
        .map_err(|e| map_metadata_error(path, e))?
        .len();

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        DeleteError::PermanentDeleteFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Deleted: {} ({})", path.display(), ByteSize(size));

    Ok(DeleteResult::new(path.to_path_buf(), size, true))
}

/// Delete one file after checking it still carries the scanned timestamp.
///
/// # Errors
///
/// - `Modified` if the file's timestamp differs from `expected_timestamp`
/// - Other errors from [`delete_to_trash`] or [`permanent_delete`]
pub fn delete_verified(
    path: &Path,
    expected_timestamp: i64,
    config: &DeleteConfig,
) -> Result<DeleteResult, DeleteError> {
    if config.verify_timestamp {
        let metadata = fs::symlink_metadata(path).map_err(|e| map_metadata_error(path, e))?;
        let current = metadata.modified().map(unix_seconds).unwrap_or(0);
        if current != expected_timestamp {
            log::warn!(
                "File modified since scan: {} (timestamp {} -> {})",
                path.display(),
                expected_timestamp,
                current
            );
            return Err(DeleteError::Modified(path.to_path_buf()));
        }
    }

    if config.use_trash {
        delete_to_trash(path)
    } else {
        permanent_delete(path)
    }
}

/// Execute a deletion plan.
///
/// Every planned file is attempted; failures are logged and collected.
#[must_use]
pub fn execute(plan: &DeletionPlan, config: &DeleteConfig) -> BatchDeleteResult {
    let mut result = BatchDeleteResult::default();

    for planned in &plan.deletions {
        let path = planned.entry.path();

        if config.dry_run {
            log::info!("Would delete ({}): {}", planned.mask, path.display());
            result.would_delete.push(path.to_path_buf());
            continue;
        }

        match delete_verified(path, planned.entry.timestamp, config) {
            Ok(del) => {
                result.bytes_freed += del.size;
                result.successes.push(del);
            }
            Err(e) => {
                log::warn!("Failed to delete {}: {}", path.display(), e);
                result.failures.push(e);
            }
        }
    }

    log::info!("{}", result.summary());
    result
}
