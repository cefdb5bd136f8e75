//! Content-hash grouping of cache entries.
//!
//! # Overview
//!
//! [`find_duplicates`] drops entries whose path matches an exclusion mask
//! or was already seen (nested targets list a file twice), then partitions the rest by byte equality of their body hash. Groups come
//! out in the order their first member was encountered, and members keep
//! encounter order inside a group. The deletion policy relies on that order
//! when it picks the survivor of a group.
//!
//! # Example
//!
//! ```
//! use dupsweep::cache::CacheEntry;
//! use dupsweep::duplicates::find_duplicates;
//! use dupsweep::mask::MaskMatcher;
//! use dupsweep::scanner::Digest;
//! use std::path::PathBuf;
//!
//! let same = Digest::from_bytes([7; 32]);
//! let entries = vec![
//!     CacheEntry::new(Digest::from_bytes([1; 32]), 0, same, PathBuf::from("/a/x.jpg")),
//!     CacheEntry::new(Digest::from_bytes([2; 32]), 0, same, PathBuf::from("/b/x.jpg")),
//!     CacheEntry::new(Digest::from_bytes([3; 32]), 0, Digest::from_bytes([9; 32]), PathBuf::from("/c/y.jpg")),
//! ];
//!
//! let no_masks: [&str; 0] = [];
//! let (groups, stats) = find_duplicates(&entries, &no_masks, &MaskMatcher::new());
//! assert_eq!(groups.len(), 1);
//! assert_eq!(stats.redundant_files, 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::cache::CacheEntry;
use crate::mask::MaskMatcher;
use crate::scanner::Digest;

/// Confirmed duplicate group of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// Content digest shared by every member
    pub body_hash: Digest,
    /// Members in encounter order
    pub entries: Vec<CacheEntry>,
}

impl DuplicateGroup {
    /// Create a new duplicate group.
    #[must_use]
    pub fn new(body_hash: Digest, entries: Vec<CacheEntry>) -> Self {
        Self { body_hash, entries }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of duplicate copies (total - 1 original).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    /// Get just the paths of files in this group.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }
}

/// Statistics from the grouping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Total number of entries considered
    pub total_entries: usize,
    /// Entries dropped by exclusion masks
    pub excluded: usize,
    /// Entries whose path was already seen
    pub repeated_paths: usize,
    /// Number of groups with 2+ members
    pub duplicate_groups: usize,
    /// Members beyond the first in every group
    pub redundant_files: usize,
}

/// Group entries by content hash.
///
/// Entries whose path matches any of `exclusion_masks` are ignored, and a
/// path seen before is counted once. Only groups with at least two members
/// are returned.
///
/// # Performance
///
/// - Time complexity: O(n) hash-map inserts plus one mask check per entry
/// - No file I/O is performed
#[must_use]
pub fn find_duplicates<S: AsRef<str>>(
    entries: &[CacheEntry],
    exclusion_masks: &[S],
    matcher: &MaskMatcher,
) -> (Vec<DuplicateGroup>, GroupingStats) {
    let mut stats = GroupingStats {
        total_entries: entries.len(),
        ..GroupingStats::default()
    };

    // Digest -> position in `order`, so output follows first encounter.
    let mut slots: HashMap<Digest, usize> = HashMap::new();
    let mut order: Vec<DuplicateGroup> = Vec::new();

    // Nested targets report the same file more than once.
    let mut seen_paths: HashSet<&Path> = HashSet::with_capacity(entries.len());

    for entry in entries {
        if !seen_paths.insert(entry.path.as_path()) {
            log::trace!("Already grouped: {}", entry.path.display());
            stats.repeated_paths += 1;
            continue;
        }

        if matcher.is_match_any(&entry.path.to_string_lossy(), exclusion_masks) {
            log::trace!("Excluded from grouping: {}", entry.path.display());
            stats.excluded += 1;
            continue;
        }

        match slots.get(&entry.body_hash) {
            Some(&slot) => order[slot].entries.push(entry.clone()),
            None => {
                slots.insert(entry.body_hash, order.len());
                order.push(DuplicateGroup::new(entry.body_hash, vec![entry.clone()]));
            }
        }
    }

    let groups: Vec<DuplicateGroup> = order.into_iter().filter(|g| g.len() > 1).collect();

    stats.duplicate_groups = groups.len();
    stats.redundant_files = groups.iter().map(DuplicateGroup::duplicate_count).sum();

    log::debug!(
        "Grouping: {} entries, {} excluded, {} repeated, {} groups, {} redundant files",
        stats.total_entries,
        stats.excluded,
        stats.repeated_paths,
        stats.duplicate_groups,
        stats.redundant_files
    );

    (groups, stats)
}
