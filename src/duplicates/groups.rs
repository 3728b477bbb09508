//! Clusters of files along one stat dimension.
//!
//! # Overview
//!
//! A [`FileGroup`] is an ordered list of shared file entities that were
//! judged equivalent on one [`Stat`]. Member order is insertion order; the
//! same entity may appear in several groups of different dimensions.
//!
//! # Example
//!
//! ```
//! use dupesieve::duplicates::FileGroup;
//! use dupesieve::scanner::FileEntry;
//! use dupesieve::stats::{file::SIZE, StatMap};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let mut group = FileGroup::new(SIZE);
//! group.add(Arc::new(FileEntry::new(Path::new("/a.jpg"), StatMap::new(), false)));
//! group.add(Arc::new(FileEntry::new(Path::new("/b.jpg"), StatMap::new(), false)));
//!
//! assert!(group.has_duplicates());
//! assert_eq!(group.kept_count(), 0);
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::scanner::FileRef;
use crate::stats::file::SIZE;
use crate::stats::Stat;

/// An ordered cluster of files sharing one dimension's equivalence class.
#[derive(Debug, Clone)]
pub struct FileGroup {
    /// Dimension the group was clustered on
    pub stat: Stat,
    /// Members in insertion order
    pub files: Vec<FileRef>,
}

impl FileGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new(stat: Stat) -> Self {
        Self {
            stat,
            files: Vec::new(),
        }
    }

    /// Create a group with initial members.
    #[must_use]
    pub fn with_files(stat: Stat, files: Vec<FileRef>) -> Self {
        Self { stat, files }
    }

    /// Append a member.
    pub fn add(&mut self, file: FileRef) {
        self.files.push(file);
    }

    /// Append a member unless the same entity (by path) is already present.
    pub fn add_unique(&mut self, file: FileRef) -> bool {
        if self.contains(&file) {
            return false;
        }
        self.files.push(file);
        true
    }

    /// Append every member of `other` not already present.
    pub fn absorb(&mut self, other: FileGroup) {
        for file in other.files {
            self.add_unique(file);
        }
    }

    /// Check membership by path.
    #[must_use]
    pub fn contains(&self, file: &FileRef) -> bool {
        self.files
            .iter()
            .any(|f| Arc::ptr_eq(f, file) || f.path() == file.path())
    }

    /// Get the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Check if the group still describes a duplicate set.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.files.len() > 1
    }

    /// Members with the keep flag set.
    #[must_use]
    pub fn kept_count(&self) -> usize {
        self.files.iter().filter(|f| f.keep()).count()
    }

    /// True when every member is kept (vacuously true for an empty group).
    #[must_use]
    pub fn all_kept(&self) -> bool {
        self.files.iter().all(|f| f.keep())
    }

    /// Member paths in order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path().to_path_buf()).collect()
    }

    /// Total bytes of the members with a known size.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files
            .iter()
            .filter_map(|f| f.value(SIZE).and_then(|v| v.as_int()))
            .map(|s| s.max(0) as u64)
            .sum()
    }

    /// Remove members by index, preserving the order of the rest.
    pub fn remove_indices(&mut self, indices: &[usize]) -> usize {
        let before = self.files.len();
        let mut idx = 0;
        self.files.retain(|_| {
            let keep = !indices.contains(&idx);
            idx += 1;
            keep
        });
        before - self.files.len()
    }
}
