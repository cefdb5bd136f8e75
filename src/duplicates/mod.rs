//! Duplicate detection module.
//!
//! Entries from the fresh cache snapshots are partitioned by content hash.
//! Only partitions with two or more members become [`DuplicateGroup`]s.

pub mod groups;

pub use groups::{find_duplicates, DuplicateGroup, GroupingStats};
