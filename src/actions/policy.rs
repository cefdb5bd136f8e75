//! Mask-driven deletion planning.
//!
//! # Overview
//!
//! [`plan_deletions`] decides which duplicates to remove. Each deletion mask
//! is applied in order to every group, and each group is always evaluated
//! against its full membership:
//!
//! - a mask matching some but not all members plans every matched member
//! - a mask matching the whole group plans every member but the first when
//!   `keep_single_file` is set, and is ignored (with a warning) otherwise
//! - a path already planned by an earlier mask is not planned again
//!
//! Masks are not compounded. Two masks may together plan every copy of some
//! content; such groups are reported in [`DeletionPlan::exhausted_groups`]
//! and logged at `warn`.
//!
//! Planning never touches the filesystem. See [`super::delete`] for
//! execution.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::cache::CacheEntry;
use crate::duplicates::DuplicateGroup;
use crate::mask::MaskMatcher;
use crate::scanner::Digest;

/// One file scheduled for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDeletion {
    /// Entry of the file to remove
    pub entry: CacheEntry,
    /// Mask that selected it
    pub mask: String,
}

/// Ordered deletion plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    /// Files to delete, in planning order
    pub deletions: Vec<PlannedDeletion>,
    /// Content hashes of groups where every member ended up planned
    pub exhausted_groups: Vec<Digest>,
}

impl DeletionPlan {
    /// Check if nothing is planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty()
    }

    /// Number of planned deletions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deletions.len()
    }

    /// Planned paths in order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.deletions.iter().map(|d| d.entry.path.clone()).collect()
    }
}

/// Build the deletion plan for `groups`.
#[must_use]
pub fn plan_deletions<S: AsRef<str>>(
    groups: &[DuplicateGroup],
    deletion_masks: &[S],
    keep_single_file: bool,
    matcher: &MaskMatcher,
) -> DeletionPlan {
    let mut plan = DeletionPlan::default();
    let mut planned: HashSet<PathBuf> = HashSet::new();

    for mask in deletion_masks {
        let mask = mask.as_ref();
        for group in groups {
            let matched: Vec<&CacheEntry> = group
                .entries
                .iter()
                .filter(|e| matcher.is_match(&e.path.to_string_lossy(), mask))
                .collect();

            let selected: &[&CacheEntry] = if matched.is_empty() {
                continue;
            } else if matched.len() < group.len() {
                &matched
            } else if keep_single_file {
                log::debug!(
                    "Mask '{}' matched all {} copies of {}, keeping {}",
                    mask,
                    group.len(),
                    group.body_hash,
                    group.entries[0].path.display()
                );
                &matched[1..]
            } else {
                log::warn!(
                    "Mask '{}' matched every copy of {} ({} files); ignored for this group",
                    mask,
                    group.body_hash,
                    group.len()
                );
                continue;
            };

            for entry in selected {
                if planned.insert(entry.path.clone()) {
                    log::debug!("Planned deletion ({}): {}", mask, entry.path.display());
                    plan.deletions.push(PlannedDeletion {
                        entry: (*entry).clone(),
                        mask: mask.to_string(),
                    });
                }
            }
        }
    }

    for group in groups {
        if group.entries.iter().all(|e| planned.contains(&e.path)) {
            log::warn!(
                "Every copy of {} is planned for deletion by the combined masks",
                group.body_hash
            );
            plan.exhausted_groups.push(group.body_hash);
        }
    }

    log::info!(
        "Deletion plan: {} file(s) across {} group(s)",
        plan.len(),
        groups.len()
    );

    plan
}
