//! Grouping engine.
//!
//! # Overview
//!
//! [`DuplicateFinder::find_duplicates`] walks every root, reads each file's
//! stats through the registry and clusters the file independently along
//! each requested dimension:
//!
//! 1. **Walk** roots in the order given, files in name order
//! 2. **Probe** batches of files on a bounded rayon pool
//! 3. **Insert** each probed file, in walk order, into the first cluster
//!    whose key matches its key (or a new cluster), then append its log
//!    records
//! 4. **Finish** by dropping single-member clusters and, when enabled,
//!    folding clusters whose keys match an earlier cluster's key
//!
//! Matching is greedy and order-dependent: a file is compared against each
//! cluster's first key only, and matchers need not be transitive. Two scans
//! of the same tree in the same order always produce the same groups.
//!
//! # Resume
//!
//! With resume enabled, an existing scan log is replayed first: every logged
//! file is put back into the cluster it joined (by exact key) and excluded
//! from the walk.
//!
//! # Example
//!
//! ```no_run
//! use dupesieve::config::Settings;
//! use dupesieve::duplicates::{DuplicateFinder, FinderConfig};
//! use dupesieve::stats::file::SIZE;
//! use std::path::PathBuf;
//!
//! let registry = Settings::default().build_registry().unwrap();
//! let finder = DuplicateFinder::new(&registry, FinderConfig::default());
//! let (groups, summary) = finder
//!     .find_duplicates(&[PathBuf::from(".")], &[SIZE])
//!     .unwrap();
//! println!("{} groups from {} files", groups.len(), summary.files_scanned);
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use rayon::prelude::*;

use super::groups::FileGroup;
use crate::progress::ProgressCallback;
use crate::scanner::{path_utils, FileEntry, FileRef, Probed, ScanError, WalkEvent, Walker, WalkerConfig};
use crate::session::{LogError, ScanLog};
use crate::stats::{HashKey, Registry, Stat};

/// Configuration for the grouping engine.
#[derive(Clone)]
pub struct FinderConfig {
    /// Number of threads probing files in parallel.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Files probed per parallel batch.
    pub batch_size: usize,
    /// Walker configuration for directory traversal.
    pub walker_config: WalkerConfig,
    /// Fold clusters whose keys match after the walk.
    pub combine: bool,
    /// Scan log location; `None` disables logging.
    pub log_path: Option<PathBuf>,
    /// Replay an existing log instead of starting a fresh one.
    pub resume: bool,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("io_threads", &self.io_threads)
            .field("batch_size", &self.batch_size)
            .field("walker_config", &self.walker_config)
            .field("combine", &self.combine)
            .field("log_path", &self.log_path)
            .field("resume", &self.resume)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            batch_size: 64,
            walker_config: WalkerConfig::default(),
            combine: true,
            log_path: None,
            resume: false,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the probing thread count.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the parallel batch size.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Enable or disable the combine pass.
    #[must_use]
    pub fn with_combine(mut self, combine: bool) -> Self {
        self.combine = combine;
        self
    }

    /// Set the scan log path.
    #[must_use]
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Replay an existing scan log.
    #[must_use]
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Summary statistics from a scan.
#[derive(Debug, Default)]
pub struct ScanSummary {
    /// Files probed during this run
    pub files_scanned: usize,
    /// Files restored from the scan log
    pub files_recovered: usize,
    /// Files skipped for their extension
    pub files_skipped: usize,
    /// Distinct extensions skipped (including those from the log)
    pub skipped_extensions: Vec<String>,
    /// Provider failures and unhashable values
    pub provider_errors: usize,
    /// Unusable scan log rows
    pub malformed_log_rows: usize,
    /// Groups produced
    pub groups: usize,
    /// Distinct files across all groups
    pub grouped_files: usize,
    /// Bytes of the distinct grouped files
    pub grouped_size: u64,
    /// Duration of the scan
    pub scan_duration: Duration,
    /// Walk errors (unreadable directories, vanished paths)
    pub scan_errors: Vec<ScanError>,
}

impl ScanSummary {
    /// Grouped size as a human-readable string.
    #[must_use]
    pub fn grouped_size_display(&self) -> String {
        ByteSize(self.grouped_size).to_string()
    }

    /// True when any per-file problem was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.provider_errors > 0 || !self.scan_errors.is_empty()
    }
}

/// Errors that can occur during a scan.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The provided root does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// No dimension was requested.
    #[error("No stats requested for grouping")]
    NoDimensions,

    /// A cluster of one dimension received a group of another.
    #[error("Group of {found} stored under the {expected} dimension")]
    GroupStatMismatch {
        /// Dimension being built
        expected: Stat,
        /// Stat of the offending group
        found: Stat,
    },

    /// Reading or writing the scan log failed.
    #[error(transparent)]
    Log(#[from] LogError),
}

/// Per-dimension key -> cluster map, in cluster creation order.
#[derive(Debug)]
struct DimensionIndex {
    stat: Stat,
    clusters: Vec<(HashKey, FileGroup)>,
}

impl DimensionIndex {
    fn new(stat: Stat) -> Self {
        Self {
            stat,
            clusters: Vec::new(),
        }
    }

    /// First cluster whose key matches `key`.
    fn find(&self, registry: &Registry, key: &HashKey) -> Option<usize> {
        self.clusters
            .iter()
            .position(|(k, _)| registry.is_match(self.stat, k, key))
    }

    fn insert_at(&mut self, slot: Option<usize>, key: HashKey, file: FileRef) -> Result<(), FinderError> {
        match slot.and_then(|idx| self.clusters.get_mut(idx)) {
            Some((_, group)) => {
                if group.stat != self.stat {
                    return Err(FinderError::GroupStatMismatch {
                        expected: self.stat,
                        found: group.stat,
                    });
                }
                group.add(file);
            }
            None => self
                .clusters
                .push((key, FileGroup::with_files(self.stat, vec![file]))),
        }
        Ok(())
    }

    /// Put a logged member back into the cluster with exactly its key.
    ///
    /// Keys that never match (even themselves) always start a new cluster,
    /// as they did when first scanned.
    fn replay(&mut self, registry: &Registry, key: HashKey, file: FileRef) -> Result<(), FinderError> {
        let slot = if registry.is_match(self.stat, &key, &key) {
            self.clusters.iter().position(|(k, _)| *k == key)
        } else {
            None
        };
        self.insert_at(slot, key, file)
    }

    fn finish(self, registry: &Registry, combine: bool) -> Vec<FileGroup> {
        let stat = self.stat;
        let mut kept: Vec<(HashKey, FileGroup)> = Vec::new();
        for (key, group) in self.clusters {
            if !group.has_duplicates() {
                continue;
            }
            let target = combine
                .then(|| kept.iter().position(|(k, _)| registry.is_match(stat, k, &key)))
                .flatten();
            match target {
                Some(idx) => kept[idx].1.absorb(group),
                None => kept.push((key, group)),
            }
        }
        kept.into_iter().map(|(_, group)| group).collect()
    }
}

/// Grouping engine bound to a registry.
pub struct DuplicateFinder<'r> {
    registry: &'r Registry,
    config: FinderConfig,
}

impl<'r> DuplicateFinder<'r> {
    /// Create a finder.
    #[must_use]
    pub fn new(registry: &'r Registry, config: FinderConfig) -> Self {
        Self { registry, config }
    }

    /// Scan `roots` and cluster files along `dimensions`.
    ///
    /// # Errors
    ///
    /// Returns `FinderError` if:
    /// - a root does not exist or is not a directory
    /// - no dimension was requested
    /// - the scan log cannot be read or written
    /// - the scan is interrupted (the log stays resumable)
    pub fn find_duplicates(
        &self,
        roots: &[PathBuf],
        dimensions: &[Stat],
    ) -> Result<(Vec<FileGroup>, ScanSummary), FinderError> {
        let start_time = Instant::now();
        let mut summary = ScanSummary::default();

        if dimensions.is_empty() {
            return Err(FinderError::NoDimensions);
        }
        for root in roots {
            if !root.exists() {
                return Err(FinderError::PathNotFound(root.clone()));
            }
            if !root.is_dir() {
                return Err(FinderError::NotADirectory(root.clone()));
            }
        }

        let mut indexes: Vec<DimensionIndex> = Vec::new();
        for stat in dimensions {
            if indexes.iter().all(|i| i.stat != *stat) {
                indexes.push(DimensionIndex::new(*stat));
            }
        }

        let (mut log, mut visited, mut skipped) = match &self.config.log_path {
            Some(path) if self.config.resume => {
                let (log, recovered) = ScanLog::resume(path, self.registry)?;
                summary.files_recovered = recovered.visited.len();
                summary.malformed_log_rows = recovered.malformed;
                let mut unrequested = HashSet::new();
                for entry in recovered.entries {
                    match indexes.iter_mut().find(|i| i.stat == entry.stat) {
                        Some(index) => index.replay(self.registry, entry.key, entry.file)?,
                        None => {
                            if unrequested.insert(entry.stat) {
                                log::warn!(
                                    "Scan log has {} entries, which is not being grouped; ignoring them",
                                    entry.stat
                                );
                            }
                        }
                    }
                }
                (log, recovered.visited, recovered.skipped)
            }
            Some(path) => (ScanLog::start(path, self.registry)?, HashSet::new(), Default::default()),
            None => (ScanLog::disabled(self.registry), HashSet::new(), Default::default()),
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads)
            .build()
            .map_err(|e| {
                log::warn!("Failed to create probe thread pool, probing sequentially: {}", e);
            })
            .ok();

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("scan", 0);
        }

        for root in roots {
            log::info!("Scanning {}", root.display());
            let mut walker = Walker::new(root, self.config.walker_config.clone());
            if let Some(ref flag) = self.config.shutdown_flag {
                walker = walker.with_shutdown_flag(flag.clone());
            }

            let mut pending: Vec<PathBuf> = Vec::new();
            for event in walker.walk() {
                match event {
                    Ok(WalkEvent::File(path)) => {
                        let canonical = path_utils::canonical(&path);
                        if !visited.insert(canonical.clone()) {
                            log::trace!("Already scanned: {}", canonical.display());
                            continue;
                        }
                        pending.push(canonical);
                        if pending.len() >= self.config.batch_size {
                            let batch = std::mem::take(&mut pending);
                            self.process_batch(batch, pool.as_ref(), &mut indexes, &mut log, &mut summary)?;
                        }
                    }
                    Ok(WalkEvent::Skipped { path, extension }) => {
                        log::trace!("Skipping {} ({})", path.display(), extension);
                        summary.files_skipped += 1;
                        if skipped.insert(extension.clone()) {
                            log::debug!("Skipping files with extension '{}'", extension);
                            log.append_skip(&extension)?;
                        }
                    }
                    Err(e) => summary.scan_errors.push(e),
                }
            }
            self.process_batch(pending, pool.as_ref(), &mut indexes, &mut log, &mut summary)?;

            if self.config.is_shutdown_requested() {
                return Err(FinderError::Interrupted);
            }
        }

        let mut groups = Vec::new();
        for index in indexes {
            groups.extend(index.finish(self.registry, self.config.combine));
        }

        let mut distinct: HashSet<&Path> = HashSet::new();
        for file in groups.iter().flat_map(|g| &g.files) {
            if distinct.insert(file.path()) {
                summary.grouped_size += file
                    .value(crate::stats::file::SIZE)
                    .and_then(|v| v.as_int())
                    .map_or(0, |s| s.max(0) as u64);
            }
        }
        summary.grouped_files = distinct.len();
        summary.groups = groups.len();
        summary.skipped_extensions = skipped.into_iter().collect();
        summary.scan_duration = start_time.elapsed();

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("scan");
        }

        log::info!(
            "Scan complete: {} files scanned, {} recovered, {} groups in {:.2}s",
            summary.files_scanned,
            summary.files_recovered,
            summary.groups,
            summary.scan_duration.as_secs_f64()
        );

        Ok((groups, summary))
    }

    /// Probe `batch` in parallel, then insert and log in walk order.
    fn process_batch(
        &self,
        batch: Vec<PathBuf>,
        pool: Option<&rayon::ThreadPool>,
        indexes: &mut [DimensionIndex],
        log: &mut ScanLog,
        summary: &mut ScanSummary,
    ) -> Result<(), FinderError> {
        if batch.is_empty() {
            return Ok(());
        }
        let registry = self.registry;
        let probe_all = || -> Vec<Probed> {
            batch
                .par_iter()
                .map(|path| FileEntry::probe(path, registry))
                .collect()
        };
        let probed = match pool {
            Some(pool) => pool.install(probe_all),
            None => batch.iter().map(|path| FileEntry::probe(path, registry)).collect(),
        };

        for item in probed {
            if self.config.is_shutdown_requested() {
                return Err(FinderError::Interrupted);
            }
            self.record(item, indexes, log, summary)?;
        }
        Ok(())
    }

    /// Insert one probed file into every dimension and log it.
    ///
    /// A file for which every requested dimension failed is neither logged
    /// nor counted, so a resumed scan probes it again.
    fn record(
        &self,
        probed: Probed,
        indexes: &mut [DimensionIndex],
        log: &mut ScanLog,
        summary: &mut ScanSummary,
    ) -> Result<(), FinderError> {
        let Probed { entry, failures } = probed;
        for failure in &failures {
            self.warn(&format!(
                "{} provider failed for {}: {}",
                failure.provider,
                entry.path().display(),
                failure.error
            ));
        }
        summary.provider_errors += failures.len();

        let file: FileRef = Arc::new(entry);
        let failed_provider = |stat: Stat| {
            self.registry
                .provider_for(stat)
                .is_some_and(|p| failures.iter().any(|f| f.provider == p.name()))
        };
        let mut staged = Vec::new();
        let mut failed = 0;
        for (pos, index) in indexes.iter().enumerate() {
            let key = match file.hash(index.stat, self.registry) {
                Ok(Some(key)) => key,
                Ok(None) => {
                    if failed_provider(index.stat) {
                        failed += 1;
                    }
                    continue;
                }
                Err(e) => {
                    self.warn(&format!("{}: {}", file.path().display(), e));
                    summary.provider_errors += 1;
                    failed += 1;
                    continue;
                }
            };
            let slot = index.find(self.registry, &key);
            let cluster_key = slot.map_or(&key, |idx| &index.clusters[idx].0);
            match self.registry.key_to_str(index.stat, cluster_key) {
                Ok(text) => staged.push((pos, slot, key, text)),
                Err(e) => {
                    self.warn(&format!("{}: {}", file.path().display(), e));
                    summary.provider_errors += 1;
                    failed += 1;
                }
            }
        }

        if failed > 0 && failed == indexes.len() {
            log::debug!("Not logging {}; it will be retried on resume", file.path().display());
            return Ok(());
        }

        let mut keys = Vec::with_capacity(staged.len());
        for (pos, slot, key, text) in staged {
            let index = &mut indexes[pos];
            index.insert_at(slot, key, Arc::clone(&file))?;
            keys.push((index.stat, text));
        }

        log.append_file(&file, &keys, self.registry)?;
        summary.files_scanned += 1;
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_progress(summary.files_scanned, &file.path().to_string_lossy());
        }
        Ok(())
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", message);
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_message(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::stats::file::{NAME, SIZE};
    use crate::stats::image::IMG_HASH;
    use std::fs::File;
    use std::io::Write;
    use tempfile::{tempdir, TempDir};

    fn write(dir: &Path, name: &str, len: usize) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        File::create(path).unwrap().write_all(&vec![b'x'; len]).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.jpg", 100);
        write(dir.path(), "b.jpg", 100);
        write(dir.path(), "c.jpg", 250);
        dir
    }

    fn names(group: &FileGroup) -> Vec<String> {
        group.files.iter().map(|f| f.file_name()).collect()
    }

    #[test]
    fn test_size_groups() {
        let dir = fixture();
        let registry = Settings::default().build_registry().unwrap();
        let finder = DuplicateFinder::new(&registry, FinderConfig::default());
        let (groups, summary) = finder
            .find_duplicates(&[dir.path().to_path_buf()], &[SIZE])
            .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].stat, SIZE);
        assert_eq!(names(&groups[0]), vec!["a.jpg", "b.jpg"]);
        assert_eq!(summary.files_scanned, 3);
        assert_eq!(summary.grouped_files, 2);
        assert_eq!(summary.grouped_size, 200);
    }

    #[test]
    fn test_size_variance_is_greedy() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.bin", 100);
        write(dir.path(), "b.bin", 104);
        write(dir.path(), "c.bin", 108);
        let settings = Settings {
            size_var: 5,
            ..Settings::default()
        };
        let registry = settings.build_registry().unwrap();
        let finder = DuplicateFinder::new(&registry, FinderConfig::default());
        let (groups, _) = finder
            .find_duplicates(&[dir.path().to_path_buf()], &[SIZE])
            .unwrap();

        // c is within 5 of b but not of the cluster key (a's size)
        assert_eq!(groups.len(), 1);
        assert_eq!(names(&groups[0]), vec!["a.bin", "b.bin"]);
    }

    #[test]
    fn test_disallowed_extensions_are_skipped() {
        let dir = fixture();
        write(dir.path(), "notes.txt", 100);
        let registry = Settings::default().build_registry().unwrap();
        let config = FinderConfig::default().with_walker_config(WalkerConfig::new(
            Some(&[".jpg".to_string()]),
            &[],
            false,
        ));
        let (groups, summary) = DuplicateFinder::new(&registry, config)
            .find_duplicates(&[dir.path().to_path_buf()], &[SIZE])
            .unwrap();

        assert_eq!(names(&groups[0]), vec!["a.jpg", "b.jpg"]);
        assert_eq!(summary.skipped_extensions, vec![".txt".to_string()]);
    }

    #[test]
    fn test_overlapping_roots_visit_files_once() {
        let dir = fixture();
        let registry = Settings::default().build_registry().unwrap();
        let finder = DuplicateFinder::new(&registry, FinderConfig::default());
        let root = dir.path().to_path_buf();
        let (groups, summary) = finder
            .find_duplicates(&[root.clone(), root], &[SIZE])
            .unwrap();
        assert_eq!(summary.files_scanned, 3);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_multiple_dimensions_share_entities() {
        let dir = tempdir().unwrap();
        write(dir.path(), "one/photo.jpg", 10);
        write(dir.path(), "two/photo.jpg", 10);
        let registry = Settings::default().build_registry().unwrap();
        let finder = DuplicateFinder::new(&registry, FinderConfig::default());
        let (groups, _) = finder
            .find_duplicates(&[dir.path().to_path_buf()], &[NAME, SIZE])
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert!(Arc::ptr_eq(&groups[0].files[0], &groups[1].files[0]));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let registry = Settings::default().build_registry().unwrap();
        let finder = DuplicateFinder::new(&registry, FinderConfig::default());
        let err = finder
            .find_duplicates(&[PathBuf::from("/no/such/dupesieve/root")], &[SIZE])
            .unwrap_err();
        assert!(matches!(err, FinderError::PathNotFound(_)));
    }

    #[test]
    fn test_no_dimensions_is_an_error() {
        let registry = Settings::default().build_registry().unwrap();
        let finder = DuplicateFinder::new(&registry, FinderConfig::default());
        assert!(matches!(
            finder.find_duplicates(&[], &[]),
            Err(FinderError::NoDimensions)
        ));
    }

    #[test]
    fn test_shutdown_flag_interrupts() {
        let dir = fixture();
        let registry = Settings::default().build_registry().unwrap();
        let config = FinderConfig::default().with_shutdown_flag(Arc::new(AtomicBool::new(true)));
        let result = DuplicateFinder::new(&registry, config)
            .find_duplicates(&[dir.path().to_path_buf()], &[SIZE]);
        assert!(matches!(result, Err(FinderError::Interrupted)));
    }

    #[test]
    fn test_combine_folds_matching_clusters() {
        let registry = Settings::default().build_registry().unwrap();
        let mut index = DimensionIndex::new(SIZE);
        let file = |name: &str| -> FileRef {
            Arc::new(FileEntry::new(
                &PathBuf::from(format!("/c/{name}")),
                Default::default(),
                false,
            ))
        };
        // Replayed keys can produce clusters with equal keys
        index.clusters.push((HashKey::Int(5), FileGroup::with_files(SIZE, vec![file("a"), file("b")])));
        index.clusters.push((HashKey::Int(5), FileGroup::with_files(SIZE, vec![file("b"), file("c")])));
        index.clusters.push((HashKey::Int(9), FileGroup::with_files(SIZE, vec![file("d")])));

        let groups = index.finish(&registry, true);
        assert_eq!(groups.len(), 1);
        assert_eq!(names(&groups[0]), vec!["a", "b", "c"]);
    }

    #[derive(Default)]
    struct Recorder {
        messages: std::sync::Mutex<Vec<String>>,
    }

    impl ProgressCallback for Recorder {
        fn on_phase_start(&self, _phase: &str, _total: usize) {}
        fn on_progress(&self, _current: usize, _path: &str) {}
        fn on_phase_end(&self, _phase: &str) {}
        fn on_message(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn test_provider_failures_reach_progress_messages() {
        let dir = fixture();
        std::fs::write(dir.path().join("broken.png"), b"garbage").unwrap();
        let registry = Settings::default().build_registry().unwrap();
        let recorder = Arc::new(Recorder::default());
        let config = FinderConfig::default()
            .with_batch_size(1)
            .with_progress_callback(recorder.clone());

        let (groups, summary) = DuplicateFinder::new(&registry, config)
            .find_duplicates(&[dir.path().to_path_buf()], &[SIZE, IMG_HASH])
            .unwrap();

        let messages = recorder.messages.lock().unwrap();
        assert!(messages.iter().any(|m| m.contains("broken.png")));
        assert_eq!(summary.files_scanned, 4);
        assert_eq!(names(&groups[0]), vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_batch_size_does_not_change_groups() {
        let dir = fixture();
        write(dir.path(), "d.jpg", 250);
        let registry = Settings::default().build_registry().unwrap();
        let scan = |config: FinderConfig| {
            let (groups, _) = DuplicateFinder::new(&registry, config)
                .find_duplicates(&[dir.path().to_path_buf()], &[SIZE])
                .unwrap();
            groups.iter().map(names).collect::<Vec<_>>()
        };
        assert_eq!(
            scan(FinderConfig::default().with_batch_size(1)),
            scan(FinderConfig::default())
        );
    }
}
