//! Group sanitizer: integrity check and clean-up of loaded groups.
//!
//! [`check_data`] never modifies anything. [`clean_data`] removes members
//! and groups, but only members whose file is gone, members that share too
//! few stats with their peers, or groups that no longer need review.

use std::path::PathBuf;

use super::groups::FileGroup;
use crate::scanner::path_utils::short_path;
use crate::scanner::FileRef;
use crate::stats::Registry;

/// Result of [`check_data`].
#[derive(Debug, Default)]
pub struct IntegrityReport {
    /// Every non-kept member across all groups, in group order
    pub candidates: Vec<FileRef>,
    /// Indices of groups with no kept member
    pub missing_selection: Vec<usize>,
    /// Total number of groups checked
    pub groups: usize,
}

impl IntegrityReport {
    /// True when no group is missing a selection.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_selection.is_empty()
    }

    /// True when every group is missing a selection.
    #[must_use]
    pub fn nothing_selected(&self) -> bool {
        self.groups > 0 && self.missing_selection.len() == self.groups
    }

    /// Candidate paths with repeats removed, first occurrence wins.
    #[must_use]
    pub fn unique_paths(&self) -> Vec<PathBuf> {
        let mut seen = std::collections::HashSet::new();
        self.candidates
            .iter()
            .map(|f| f.path().to_path_buf())
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }

    /// [`unique_paths`](Self::unique_paths) relative to the longest matching
    /// root, for display.
    #[must_use]
    pub fn short_paths(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        self.unique_paths()
            .iter()
            .map(|p| short_path(p, roots))
            .collect()
    }
}

/// Report non-kept members as deletion candidates.
///
/// Groups without any kept member are listed and logged as a warning; their
/// members are still returned as candidates.
#[must_use]
pub fn check_data(groups: &[FileGroup]) -> IntegrityReport {
    let mut report = IntegrityReport {
        groups: groups.len(),
        ..IntegrityReport::default()
    };
    for (idx, group) in groups.iter().enumerate() {
        report
            .candidates
            .extend(group.files.iter().filter(|f| !f.keep()).cloned());
        if group.kept_count() == 0 {
            report.missing_selection.push(idx);
        }
    }

    if report.nothing_selected() {
        log::warn!("No group has a file marked to keep; add marks in the Keep column");
    } else if !report.is_complete() {
        let list: Vec<String> = report
            .missing_selection
            .iter()
            .map(ToString::to_string)
            .collect();
        log::warn!("Groups missing a file to keep: {}", list.join(", "));
    }
    report
}

/// Options for [`clean_data`].
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Drop members sharing fewer than this many stats with every peer (0 disables)
    pub min_stats: usize,
    /// Remove a group entirely when only one member would survive
    pub clean_solo: bool,
    /// Remove groups whose surviving members are all kept
    pub clean_kept: bool,
    /// Scan roots; logged paths are shown relative to them
    pub roots: Vec<PathBuf>,
}

/// Counts returned by [`clean_data`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Members removed from groups
    pub files_removed: usize,
    /// Groups removed entirely
    pub groups_removed: usize,
}

/// Remove stale members and groups in place.
pub fn clean_data(groups: &mut Vec<FileGroup>, options: CleanOptions, registry: &Registry) -> CleanReport {
    let mut report = CleanReport::default();
    let mut emptied = Vec::new();

    for (idx, group) in groups.iter_mut().enumerate() {
        let len = group.len();
        let mut removed: Vec<usize> = (0..len)
            .filter(|&i| !group.files[i].recheck_exists())
            .collect();

        if options.min_stats > 0 {
            let unmatched: Vec<usize> = (0..len)
                .filter(|i| !removed.contains(i))
                .filter(|&i| !has_peer(group, i, &removed, options.min_stats, registry))
                .collect();
            removed.extend(unmatched);
        }

        if options.clean_solo && removed.len() + 1 == len {
            removed = (0..len).collect();
        }

        for &i in &removed {
            log::info!("Cleaned up file: {}", group.files[i].short(&options.roots).display());
        }
        report.files_removed += group.remove_indices(&removed);

        let drop_group = if options.clean_kept {
            group.all_kept()
        } else {
            group.is_empty()
        };
        if drop_group {
            emptied.push(idx);
        }
    }

    for idx in emptied.into_iter().rev() {
        groups.remove(idx);
        report.groups_removed += 1;
        log::info!("Removed entire group: {}", idx);
    }
    report
}

fn has_peer(group: &FileGroup, idx: usize, removed: &[usize], min_stats: usize, registry: &Registry) -> bool {
    let file = &group.files[idx];
    group
        .files
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != idx && !removed.contains(j))
        .any(|(_, other)| file.match_count(other, registry, Some(min_stats)) >= min_stats)
}
