//! Keep decision engine.
//!
//! # Overview
//!
//! For every group, [`AutoKeeper::run`] marks at most one member as the copy
//! to retain (or, when a removal-path restriction applies, every member
//! outside the removal paths):
//!
//! 1. If any member is already kept, the group is left alone.
//! 2. If removal paths are configured, every member outside them is kept.
//! 3. Otherwise the group's pipeline of narrowing rules runs until one
//!    candidate is left, and the first survivor is kept.
//!
//! If a rule narrows the candidates to nothing, the group ends up with no
//! kept file. That outcome is reported as [`KeepOutcome::NoSelection`] and
//! logged; it is never papered over.
//!
//! # Pipeline lookup
//!
//! Pipelines are collected from the registry once, at construction. A group
//! uses the pipeline registered for its exact stat, else the default pipeline
//! of the last-registered provider that accepts every member, else the
//! filesystem default.

use std::collections::HashMap;
use std::path::PathBuf;

use super::groups::FileGroup;
use super::narrow::Rule;
use crate::scanner::path_utils::{is_under, normalize_extension};
use crate::stats::{Registry, Stat};

/// Preferences consulted by the built-in narrowing rules.
#[derive(Debug, Clone, Default)]
pub struct KeepSettings {
    /// Preferred extensions, best first (lowercase, dotted)
    pub extensions: Vec<String>,
    /// Preferred roots, best first
    pub roots: Vec<PathBuf>,
    /// Size tolerance in bytes
    pub size_var: i64,
    /// Timestamp tolerance in seconds
    pub time_var: i64,
    /// Pixel-count tolerance
    pub dimension_var: i64,
    /// Duration tolerance in seconds
    pub duration_var: f64,
    /// Bitrate tolerance in bits per second
    pub bitrate_var: i64,
    /// Preferred image encodings, best first (lowercase)
    pub img_codecs: Vec<String>,
    /// Preferred media containers, best first (lowercase)
    pub containers: Vec<String>,
    /// Files under these paths are never auto-kept
    pub rm_paths: Vec<PathBuf>,
}

impl KeepSettings {
    /// Normalise extension spelling and codec case.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.extensions = self
            .extensions
            .iter()
            .map(|e| normalize_extension(e))
            .collect();
        self.img_codecs = self.img_codecs.iter().map(|c| c.to_lowercase()).collect();
        self.containers = self.containers.iter().map(|c| c.to_lowercase()).collect();
        self
    }
}

/// Pipelines contributed by one provider.
#[derive(Debug, Clone, Default)]
pub struct KeepRules {
    /// Pipeline for groups of this provider's files without a per-stat entry
    pub default: Option<Vec<Rule>>,
    /// Pipelines for groups clustered on specific stats
    pub per_stat: Vec<(Stat, Vec<Rule>)>,
}

/// What [`AutoKeeper::run`] did to a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepOutcome {
    /// A member was already kept; nothing changed.
    AlreadyKept,
    /// Removal paths applied; this many members outside them were kept.
    Restricted(usize),
    /// The pipeline picked this member.
    Selected(PathBuf),
    /// A rule left no candidates; nothing was kept.
    NoSelection {
        /// Rule that emptied the candidate list
        rule: String,
    },
}

/// Errors raised by the keep engine.
#[derive(thiserror::Error, Debug)]
pub enum KeepError {
    /// No pipeline applies to the group.
    #[error("No keep pipeline applies to a {0} group")]
    NoPipeline(Stat),
}

/// Per-group keep selection with pipelines fixed at construction.
#[derive(Debug)]
pub struct AutoKeeper {
    by_stat: HashMap<Stat, Vec<Rule>>,
    /// Provider defaults in registration order
    defaults: Vec<(&'static str, Vec<Rule>)>,
    rm_paths: Vec<PathBuf>,
}

impl AutoKeeper {
    /// Collect pipelines from every registered provider.
    #[must_use]
    pub fn new(registry: &Registry, settings: &KeepSettings) -> Self {
        let mut by_stat = HashMap::new();
        let mut defaults = Vec::new();
        for provider in registry.providers() {
            let rules = provider.keep_rules(settings);
            if let Some(default) = rules.default {
                defaults.push((provider.name(), default));
            }
            for (stat, pipeline) in rules.per_stat {
                by_stat.insert(stat, pipeline);
            }
        }
        Self {
            by_stat,
            defaults,
            rm_paths: settings.rm_paths.clone(),
        }
    }

    /// The pipeline a group would use.
    pub fn pipeline_for(&self, group: &FileGroup, registry: &Registry) -> Result<&[Rule], KeepError> {
        if let Some(rules) = self.by_stat.get(&group.stat) {
            return Ok(rules);
        }
        self.defaults
            .iter()
            .rev()
            .find(|(name, _)| {
                registry
                    .provider(name)
                    .is_some_and(|p| group.files.iter().all(|f| p.accepts(f.path())))
            })
            .map(|(_, rules)| rules.as_slice())
            .ok_or(KeepError::NoPipeline(group.stat))
    }

    /// Decide which member(s) of `group` to keep.
    pub fn run(&self, group: &FileGroup, registry: &Registry) -> Result<KeepOutcome, KeepError> {
        if group.files.iter().any(|f| f.keep()) {
            return Ok(KeepOutcome::AlreadyKept);
        }

        if !self.rm_paths.is_empty() {
            let mut kept = 0;
            for file in &group.files {
                if !self.rm_paths.iter().any(|rm| is_under(file.path(), rm)) {
                    file.set_keep(true);
                    kept += 1;
                }
            }
            return Ok(KeepOutcome::Restricted(kept));
        }

        let pipeline = self.pipeline_for(group, registry)?;
        let mut candidates = group.files.clone();
        for rule in pipeline {
            if candidates.len() < 2 {
                break;
            }
            candidates = rule.apply(&candidates);
            if candidates.is_empty() {
                log::warn!(
                    "Keep rule '{}' left no candidates in a {} group of {} files; nothing kept",
                    rule.name(),
                    group.stat,
                    group.len()
                );
                return Ok(KeepOutcome::NoSelection {
                    rule: rule.name().to_string(),
                });
            }
        }

        match candidates.first() {
            Some(chosen) => {
                chosen.set_keep(true);
                log::trace!("Keeping {}", chosen.path().display());
                Ok(KeepOutcome::Selected(chosen.path().to_path_buf()))
            }
            None => Ok(KeepOutcome::NoSelection {
                rule: String::from("(empty group)"),
            }),
        }
    }

    /// Run over every group, returning per-outcome counts.
    pub fn run_all(&self, groups: &[FileGroup], registry: &Registry) -> Result<KeepSummary, KeepError> {
        let mut summary = KeepSummary::default();
        for group in groups {
            match self.run(group, registry)? {
                KeepOutcome::AlreadyKept => summary.already_kept += 1,
                KeepOutcome::Restricted(_) => summary.restricted += 1,
                KeepOutcome::Selected(_) => summary.selected += 1,
                KeepOutcome::NoSelection { .. } => summary.no_selection += 1,
            }
        }
        Ok(summary)
    }
}

/// Aggregate result of [`AutoKeeper::run_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepSummary {
    /// Groups that already had a kept member
    pub already_kept: usize,
    /// Groups resolved by the removal-path restriction
    pub restricted: usize,
    /// Groups where the pipeline picked a member
    pub selected: usize,
    /// Groups left without a kept member
    pub no_selection: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::duplicates::narrow::pass_test;
    use crate::scanner::FileEntry;
    use crate::stats::file::{MTIME, NAME, SIZE};
    use crate::stats::{StatMap, StatValue};
    use chrono::NaiveDate;
    use std::path::Path;
    use std::sync::Arc;

    fn registry() -> Registry {
        Settings::default().build_registry().unwrap()
    }

    fn entry(path: &str, size: i64, day: u32) -> Arc<FileEntry> {
        let mut stats = StatMap::new();
        stats.insert(SIZE, StatValue::Int(size));
        let stem = Path::new(path).file_stem().unwrap().to_string_lossy().into_owned();
        stats.insert(NAME, StatValue::Text(stem));
        let time = NaiveDate::from_ymd_opt(2020, 1, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        stats.insert(MTIME, StatValue::Time(time));
        Arc::new(FileEntry::new(Path::new(path), stats, false))
    }

    #[test]
    fn test_default_pipeline_prefers_largest() {
        let registry = registry();
        let keeper = AutoKeeper::new(&registry, &KeepSettings::default());
        let group = FileGroup::with_files(
            NAME,
            vec![entry("/k/a.jpg", 10, 1), entry("/k/b.jpg", 20, 1)],
        );
        let outcome = keeper.run(&group, &registry).unwrap();
        assert!(matches!(outcome, KeepOutcome::Selected(ref p) if p.ends_with("b.jpg")));
        assert!(!group.files[0].keep());
        assert!(group.files[1].keep());
    }

    #[test]
    fn test_size_group_prefers_newest() {
        let registry = registry();
        let keeper = AutoKeeper::new(&registry, &KeepSettings::default());
        let group = FileGroup::with_files(
            SIZE,
            vec![entry("/k/old.jpg", 10, 1), entry("/k/new.jpg", 10, 5)],
        );
        keeper.run(&group, &registry).unwrap();
        assert!(group.files[1].keep());
    }

    #[test]
    fn test_already_kept_group_is_untouched() {
        let registry = registry();
        let keeper = AutoKeeper::new(&registry, &KeepSettings::default());
        let group = FileGroup::with_files(
            NAME,
            vec![entry("/k/a.jpg", 10, 1), entry("/k/b.jpg", 20, 1)],
        );
        group.files[0].set_keep(true);
        assert_eq!(
            keeper.run(&group, &registry).unwrap(),
            KeepOutcome::AlreadyKept
        );
        assert!(!group.files[1].keep());
    }

    #[test]
    fn test_rm_paths_keep_everything_outside() {
        let registry = registry();
        let settings = KeepSettings {
            rm_paths: vec![PathBuf::from("/k/trash")],
            ..Default::default()
        };
        let keeper = AutoKeeper::new(&registry, &settings);
        let group = FileGroup::with_files(
            NAME,
            vec![
                entry("/k/trash/a.jpg", 10, 1),
                entry("/k/keep/b.jpg", 10, 1),
                entry("/k/keep/c.jpg", 10, 1),
            ],
        );
        assert_eq!(
            keeper.run(&group, &registry).unwrap(),
            KeepOutcome::Restricted(2)
        );
        assert!(!group.files[0].keep());
        assert!(group.files[1].keep() && group.files[2].keep());
    }

    #[test]
    fn test_empty_narrowing_keeps_nothing() {
        let registry = registry();
        let mut keeper = AutoKeeper::new(&registry, &KeepSettings::default());
        keeper
            .by_stat
            .insert(NAME, vec![pass_test("reject all", |_| false)]);
        let group = FileGroup::with_files(
            NAME,
            vec![entry("/k/a.jpg", 10, 1), entry("/k/b.jpg", 20, 1)],
        );
        let outcome = keeper.run(&group, &registry).unwrap();
        assert_eq!(
            outcome,
            KeepOutcome::NoSelection {
                rule: "reject all".into()
            }
        );
        assert_eq!(group.kept_count(), 0);
    }

    #[test]
    fn test_keep_is_idempotent() {
        let registry = registry();
        let keeper = AutoKeeper::new(&registry, &KeepSettings::default());
        let groups = vec![FileGroup::with_files(
            NAME,
            vec![entry("/k/a.jpg", 10, 1), entry("/k/b.jpg", 20, 1)],
        )];
        let first = keeper.run_all(&groups, &registry).unwrap();
        let flags: Vec<_> = groups[0].files.iter().map(|f| f.keep()).collect();
        let second = keeper.run_all(&groups, &registry).unwrap();
        assert_eq!(first.selected, 1);
        assert_eq!(second.already_kept, 1);
        let again: Vec<_> = groups[0].files.iter().map(|f| f.keep()).collect();
        assert_eq!(flags, again);
    }
}
