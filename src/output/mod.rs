//! Output of scan results.
//!
//! The only format is the plain-text duplicates report; see [`report`].

pub mod report;

pub use report::{write_report, ReportError, ReportOutput, ReportStatus};
