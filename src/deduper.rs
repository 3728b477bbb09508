//! High-level operations over one set of groups.
//!
//! [`Deduper`] owns the registry built from [`Settings`], the dimensions to
//! group by, and the current groups (from a scan or a loaded snapshot). The
//! CLI drives it one operation at a time:
//!
//! ```no_run
//! use dupesieve::config::Settings;
//! use dupesieve::deduper::Deduper;
//! use std::path::{Path, PathBuf};
//!
//! let mut deduper = Deduper::new(Settings::default(), vec![PathBuf::from("/photos")])?;
//! deduper.scan(false)?;
//! deduper.auto_keep()?;
//! deduper.save_snapshot(Path::new("results.csv"), false)?;
//! # Ok::<(), dupesieve::deduper::DeduperError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::Settings;
use crate::duplicates::{
    check_data, clean_data, AutoKeeper, CleanOptions, CleanReport, DuplicateFinder, FileGroup,
    FinderConfig, FinderError, IntegrityReport, KeepError, KeepSummary, ScanSummary,
};
use crate::progress::ProgressCallback;
use crate::scanner::path_utils;
use crate::session::{LogError, ScanLog, Snapshot, SnapshotError};
use crate::stats::{Registry, RegistryError, Stat};

/// Errors raised by [`Deduper`] operations.
#[derive(thiserror::Error, Debug)]
pub enum DeduperError {
    /// Provider setup or stat lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The scan failed or was interrupted.
    #[error(transparent)]
    Finder(#[from] FinderError),
    /// The snapshot could not be saved or loaded.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// A group had no applicable keep pipeline.
    #[error(transparent)]
    Keep(#[from] KeepError),
    /// The scan log could not be removed.
    #[error(transparent)]
    Log(#[from] LogError),
}

/// Orchestrates scanning, persistence, keep selection and clean-up.
pub struct Deduper {
    settings: Settings,
    registry: Registry,
    roots: Vec<PathBuf>,
    dimensions: Vec<Stat>,
    groups: Vec<FileGroup>,
    scanned: bool,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Deduper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduper")
            .field("roots", &self.roots)
            .field("dimensions", &self.dimensions)
            .field("groups", &self.groups.len())
            .field("scanned", &self.scanned)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl Deduper {
    /// Build the registry and resolve the grouping dimensions.
    ///
    /// `settings.group_by` names are resolved against the registry; an empty
    /// list uses every provider's default dimensions.
    pub fn new(settings: Settings, roots: Vec<PathBuf>) -> Result<Self, DeduperError> {
        let registry = settings.build_registry()?;
        let dimensions = if settings.group_by.is_empty() {
            registry.default_group_by()
        } else {
            settings
                .group_by
                .iter()
                .map(|name| registry.resolve(name))
                .collect::<Result<Vec<_>, _>>()?
        };
        log::debug!(
            "Grouping by {}",
            dimensions.iter().map(Stat::name).collect::<Vec<_>>().join(", ")
        );
        Ok(Self {
            settings,
            registry,
            roots,
            dimensions,
            groups: Vec::new(),
            scanned: false,
            shutdown_flag: None,
            progress_callback: None,
        })
    }

    /// Set the shutdown flag checked during scans.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the scan progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Active registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dimensions scanned and auto-kept.
    #[must_use]
    pub fn dimensions(&self) -> &[Stat] {
        &self.dimensions
    }

    /// Scan roots.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Current groups.
    #[must_use]
    pub fn groups(&self) -> &[FileGroup] {
        &self.groups
    }

    /// True when a scan log from an earlier run can be resumed.
    #[must_use]
    pub fn can_resume(&self) -> bool {
        ScanLog::exists(&self.settings.log_path)
    }

    /// Scan the roots, replacing the current groups.
    pub fn scan(&mut self, resume: bool) -> Result<ScanSummary, DeduperError> {
        let mut config = FinderConfig::default()
            .with_io_threads(self.settings.io_threads)
            .with_walker_config(self.settings.walker_config())
            .with_combine(self.settings.combine)
            .with_log_path(&self.settings.log_path)
            .with_resume(resume);
        if let Some(ref flag) = self.shutdown_flag {
            config = config.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(ref callback) = self.progress_callback {
            config = config.with_progress_callback(Arc::clone(callback));
        }

        let finder = DuplicateFinder::new(&self.registry, config);
        let (groups, summary) = finder.find_duplicates(&self.roots, &self.dimensions)?;
        self.groups = groups;
        self.scanned = true;
        Ok(summary)
    }

    /// Replace the current groups with a snapshot's.
    pub fn load_snapshot(&mut self, path: &Path) -> Result<usize, DeduperError> {
        self.groups = Snapshot::for_registry(&self.registry).load(path, &self.registry)?;
        Ok(self.groups.len())
    }

    /// Persist the current groups.
    ///
    /// After a scan in this session, a successful save also deletes the scan
    /// log. A refused or failed save leaves the log for a later resume.
    pub fn save_snapshot(&self, path: &Path, overwrite: bool) -> Result<(), DeduperError> {
        Snapshot::for_registry(&self.registry).save(path, &self.groups, &self.registry, overwrite)?;
        if self.scanned {
            ScanLog::discard(&self.settings.log_path)?;
        }
        Ok(())
    }

    /// Run the keep engine over groups of the configured dimensions.
    pub fn auto_keep(&self) -> Result<KeepSummary, DeduperError> {
        let keeper = AutoKeeper::new(&self.registry, &self.settings.keep_settings(&self.roots));
        let targets: Vec<FileGroup> = self
            .groups
            .iter()
            .filter(|g| self.dimensions.contains(&g.stat))
            .cloned()
            .collect();
        let summary = keeper.run_all(&targets, &self.registry)?;
        log::info!(
            "Auto-keep: {} selected, {} restricted, {} already kept, {} without selection",
            summary.selected,
            summary.restricted,
            summary.already_kept,
            summary.no_selection
        );
        Ok(summary)
    }

    /// Set every keep flag to `value`; returns the number of files changed.
    pub fn reset_keep(&self, value: bool) -> usize {
        let mut changed = 0;
        for file in self.groups.iter().flat_map(|g| &g.files) {
            if file.keep() != value {
                file.set_keep(value);
                changed += 1;
            }
        }
        changed
    }

    /// Silently drop vanished files, then report deletion candidates.
    pub fn integrity_check(&mut self) -> IntegrityReport {
        let options = CleanOptions {
            roots: self.roots.clone(),
            ..CleanOptions::default()
        };
        clean_data(&mut self.groups, options, &self.registry);
        check_data(&self.groups)
    }

    /// Remove stale members and groups.
    pub fn clean(&mut self, options: CleanOptions) -> CleanReport {
        clean_data(&mut self.groups, options, &self.registry)
    }

    /// Clean options with the configured shared-stat filter.
    #[must_use]
    pub fn clean_options(&self, use_filter: bool) -> CleanOptions {
        CleanOptions {
            min_stats: if use_filter { self.settings.clean_filter } else { 0 },
            clean_solo: true,
            clean_kept: true,
            roots: self.roots.clone(),
        }
    }

    /// Shell command removing every deletion candidate, or `None` when there
    /// is nothing to remove. Nothing is executed.
    pub fn removal_command(&mut self) -> Option<String> {
        let report = self.integrity_check();
        let paths = report.unique_paths();
        if paths.is_empty() {
            return None;
        }
        let quoted: Vec<String> = paths.iter().map(|p| path_utils::shell_quote(p)).collect();
        Some(format!("rm -- {}", quoted.join(" ")))
    }
}
