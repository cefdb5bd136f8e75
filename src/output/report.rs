//! Plain-text duplicates report.
//!
//! The report lists one block per duplicate group: a `---` separator line
//! followed by each member path on its own line.
//!
//! ```text
//! ---
//! /photos/2021/img_001.jpg
//! /backup/photos/img_001.jpg
//! ---
//! /music/track.mp3
//! /music/copy of track.mp3
//! ```
//!
//! [`write_report`] writes to `<report>.tmp` and renames it over the report,
//! so readers never see a half-written file. With zero groups any stale
//! report is removed instead.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::duplicates::DuplicateGroup;

/// Separator line written before every group.
pub const GROUP_SEPARATOR: &str = "---";

/// Error writing or removing the report.
#[derive(Debug, Error)]
#[error("duplicates report {path}: {source}")]
pub struct ReportError {
    /// Report path
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// What [`write_report`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    /// The report was written with this many groups.
    Written(usize),
    /// No groups; a stale report was removed.
    Removed,
    /// No groups and no report existed.
    Unchanged,
}

/// Formatter for the plain-text report.
pub struct ReportOutput<'a> {
    groups: &'a [DuplicateGroup],
}

impl<'a> ReportOutput<'a> {
    /// Create a new report formatter.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup]) -> Self {
        Self { groups }
    }

    /// Write the report to any writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for group in self.groups {
            writeln!(writer, "{GROUP_SEPARATOR}")?;
            for entry in &group.entries {
                writeln!(writer, "{}", entry.path.display())?;
            }
        }
        Ok(())
    }

    /// Render the report into a string.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Write the report for `groups` to `path`, or remove a stale report when
/// there are no groups.
///
/// # Errors
///
/// Returns [`ReportError`] if the file cannot be written, renamed, or
/// removed.
pub fn write_report(path: &Path, groups: &[DuplicateGroup]) -> Result<ReportStatus, ReportError> {
    let wrap = |source: io::Error| ReportError {
        path: path.to_path_buf(),
        source,
    };

    if groups.is_empty() {
        return match fs::remove_file(path) {
            Ok(()) => {
                log::info!("No duplicates; removed stale report {}", path.display());
                Ok(ReportStatus::Removed)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ReportStatus::Unchanged),
            Err(e) => Err(wrap(e)),
        };
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(wrap)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let file = File::create(&tmp_path).map_err(wrap)?;
    let mut writer = BufWriter::new(file);
    ReportOutput::new(groups)
        .write_to(&mut writer)
        .map_err(wrap)?;
    let file = writer.into_inner().map_err(|e| wrap(e.into_error()))?;
    file.sync_all().map_err(wrap)?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(wrap)?;

    log::info!(
        "Duplicates report {} saved ({} groups)",
        path.display(),
        groups.len()
    );
    Ok(ReportStatus::Written(groups.len()))
}
