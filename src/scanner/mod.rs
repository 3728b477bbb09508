//! File discovery and the shared file entity.
//!
//! This module provides:
//! - [`Walker`]: sequential, sorted directory traversal with extension and
//!   filename filtering
//! - [`FileEntry`]: one file on disk, shared by every group that contains it
//! - Unicode-aware path canonicalisation ([`path_utils`])
//! - Perceptual image fingerprints ([`perceptual`])
//!
//! # Shared entities
//!
//! A file appears in one group per dimension it was clustered on. All of those
//! groups hold the same [`FileRef`] (`Arc<FileEntry>`), so setting the keep flag
//! through one group is visible through every other. The stat snapshot is
//! replaced wholesale on refresh and never mutated in place.
//!
//! # Example
//!
//! ```no_run
//! use dupesieve::config::Settings;
//! use dupesieve::scanner::FileEntry;
//! use std::path::Path;
//!
//! let registry = Settings::default().build_registry().unwrap();
//! let probed = FileEntry::probe(Path::new("photo.png"), &registry);
//! println!("{} ({} failures)", probed.entry, probed.failures.len());
//! ```

pub mod path_utils;
pub mod perceptual;
pub mod walker;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::stats::{HashKey, ProviderError, Registry, Stat, StatMap, StatValue};

pub use walker::{WalkEvent, Walker};

/// Shared handle to a file entity.
pub type FileRef = Arc<FileEntry>;

/// One file on disk, identified by its canonical path.
#[derive(Debug)]
pub struct FileEntry {
    path: PathBuf,
    exists: AtomicBool,
    keep: AtomicBool,
    stats: RwLock<Arc<StatMap>>,
}

/// A provider that failed while probing a file.
#[derive(Debug)]
pub struct ProbeFailure {
    /// Provider name
    pub provider: &'static str,
    /// What went wrong
    pub error: ProviderError,
}

/// Result of reading every applicable provider for one file.
#[derive(Debug)]
pub struct Probed {
    /// The new entity; stats from failed providers are absent
    pub entry: FileEntry,
    /// Providers that failed; the file stays usable for the others
    pub failures: Vec<ProbeFailure>,
}

impl FileEntry {
    /// Create an entity from already known parts. `path` is canonicalised.
    #[must_use]
    pub fn new(path: &Path, stats: StatMap, keep: bool) -> Self {
        let path = path_utils::canonical(path);
        let exists = path.is_file();
        Self {
            path,
            exists: AtomicBool::new(exists),
            keep: AtomicBool::new(keep),
            stats: RwLock::new(Arc::new(stats)),
        }
    }

    /// Read current stats from every provider that applies to `path`.
    #[must_use]
    pub fn probe(path: &Path, registry: &Registry) -> Probed {
        let (stats, failures) = read_current(path, registry);
        Probed {
            entry: Self::new(path, stats, false),
            failures,
        }
    }

    /// Rebuild an entity from stored strings.
    ///
    /// Empty cells are treated as absent values. Cells that fail to parse are
    /// dropped and reported.
    pub fn from_strings<'a>(
        path: &Path,
        keep: bool,
        cells: impl IntoIterator<Item = (Stat, &'a str)>,
        registry: &Registry,
    ) -> (Self, Vec<ProviderError>) {
        let mut stats = StatMap::new();
        let mut errors = Vec::new();
        for (stat, cell) in cells {
            if cell.trim().is_empty() {
                continue;
            }
            match registry.from_str(stat, cell) {
                Ok(value) => {
                    stats.insert(stat, value);
                }
                Err(e) => errors.push(e),
            }
        }
        (Self::new(path, stats, keep), errors)
    }

    /// Re-read the file from disk, replacing the stat snapshot wholesale.
    ///
    /// Returns `false` (and leaves the snapshot alone) when the file is gone.
    pub fn refresh(&self, registry: &Registry) -> bool {
        let exists = self.path.is_file();
        self.exists.store(exists, Ordering::SeqCst);
        if !exists {
            return false;
        }
        let (stats, failures) = read_current(&self.path, registry);
        for failure in failures {
            log::warn!(
                "{} provider failed for {}: {}",
                failure.provider,
                self.path.display(),
                failure.error
            );
        }
        self.replace_stats(stats);
        true
    }

    fn replace_stats(&self, stats: StatMap) {
        let fresh = Arc::new(stats);
        match self.stats.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }

    /// Canonical path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file existed when last checked.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists.load(Ordering::SeqCst)
    }

    /// Re-check existence on disk.
    pub fn recheck_exists(&self) -> bool {
        let exists = self.path.is_file();
        self.exists.store(exists, Ordering::SeqCst);
        exists
    }

    /// Keep flag.
    #[must_use]
    pub fn keep(&self) -> bool {
        self.keep.load(Ordering::SeqCst)
    }

    /// Set the keep flag (visible through every group sharing this entity).
    pub fn set_keep(&self, keep: bool) {
        self.keep.store(keep, Ordering::SeqCst);
    }

    /// Current stat snapshot.
    #[must_use]
    pub fn stats(&self) -> Arc<StatMap> {
        match self.stats.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Value of one stat, if known.
    #[must_use]
    pub fn value(&self, stat: Stat) -> Option<StatValue> {
        self.stats().get(&stat).cloned()
    }

    /// Clustering key of one stat, `Ok(None)` when the value is absent.
    pub fn hash(&self, stat: Stat, registry: &Registry) -> Result<Option<HashKey>, ProviderError> {
        self.stats()
            .get(&stat)
            .map(|value| registry.hash(stat, value))
            .transpose()
    }

    /// Storage string of one stat, empty when absent.
    #[must_use]
    pub fn to_str(&self, stat: Stat, registry: &Registry) -> String {
        self.stats()
            .get(&stat)
            .and_then(|value| registry.to_str(stat, value).ok())
            .unwrap_or_default()
    }

    /// Number of stats on which this file matches `other`.
    ///
    /// Comparing an entity with itself counts every stat (or `max`). Stats
    /// missing on either side never count. Stops counting at `max`.
    #[must_use]
    pub fn match_count(&self, other: &FileEntry, registry: &Registry, max: Option<usize>) -> usize {
        let mine = self.stats();
        if std::ptr::eq(self, other) {
            return max.unwrap_or(mine.len());
        }
        let theirs = other.stats();
        let mut count = 0;
        for (stat, value) in mine.iter() {
            if max.is_some_and(|m| count >= m) {
                break;
            }
            let Some(other_value) = theirs.get(stat) else {
                continue;
            };
            let (Ok(a), Ok(b)) = (registry.hash(*stat, value), registry.hash(*stat, other_value))
            else {
                continue;
            };
            if registry.is_match(*stat, &a, &b) {
                count += 1;
            }
        }
        count
    }

    /// Lowercase dotted extension.
    #[must_use]
    pub fn extension(&self) -> String {
        path_utils::dotted_extension(&self.path)
    }

    /// File name without directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path relative to the longest matching root, for display.
    #[must_use]
    pub fn short(&self, roots: &[PathBuf]) -> PathBuf {
        path_utils::short_path(&self.path, roots)
    }
}

impl PartialEq for FileEntry {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileEntry {}

impl Hash for FileEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.keep() { "*" } else { " " };
        write!(f, "{mark} {}", self.path.display())
    }
}

fn read_current(path: &Path, registry: &Registry) -> (StatMap, Vec<ProbeFailure>) {
    let mut stats = StatMap::new();
    let mut failures = Vec::new();
    for provider in registry.providers() {
        match provider.current_stats(path) {
            Ok(Some(values)) => stats.extend(values),
            Ok(None) => {}
            Err(error) => failures.push(ProbeFailure {
                provider: provider.name(),
                error,
            }),
        }
    }
    (stats, failures)
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Allowed lowercase dotted extensions; `None` allows everything.
    pub extensions: Option<Vec<String>>,

    /// Lowercase file names to skip silently.
    pub ignore: Vec<String>,
}

impl WalkerConfig {
    /// Build a configuration, normalising extensions and ignore names.
    #[must_use]
    pub fn new(extensions: Option<&[String]>, ignore: &[String], follow_symlinks: bool) -> Self {
        Self {
            follow_symlinks,
            extensions: extensions.map(|exts| {
                exts.iter()
                    .map(|e| path_utils::normalize_extension(e))
                    .collect()
            }),
            ignore: ignore.iter().map(|n| n.to_lowercase()).collect(),
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
