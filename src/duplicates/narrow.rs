//! Narrowing functions for keep selection.
//!
//! A [`Rule`] reduces a candidate list to its most-preferred subset under one
//! criterion. Rules are pure: they never touch keep flags and never reorder
//! the survivors. The keep engine chains them until one candidate is left.
//!
//! Three building blocks cover every built-in rule:
//!
//! - [`pass_test`]: keep candidates passing a predicate
//! - [`min_max`]: keep candidates within a variance band of the extreme value
//! - [`preference_rank`]: keep candidates matching the best-ranked preference

use std::fmt;
use std::sync::Arc;

use crate::scanner::{FileEntry, FileRef};

type NarrowFn = dyn Fn(&[FileRef]) -> Vec<FileRef> + Send + Sync;

/// One named narrowing step.
#[derive(Clone)]
pub struct Rule {
    name: String,
    func: Arc<NarrowFn>,
}

impl Rule {
    /// Wrap a narrowing closure.
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[FileRef]) -> Vec<FileRef> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Rule name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the rule.
    #[must_use]
    pub fn apply(&self, candidates: &[FileRef]) -> Vec<FileRef> {
        (self.func)(candidates)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rule").field(&self.name).finish()
    }
}

/// Which end of a value range wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    /// Smallest value wins
    Min,
    /// Largest value wins
    Max,
}

/// Which end of a preference list ranks highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefer {
    /// Earlier entries are preferred
    Front,
    /// Later entries are preferred
    Back,
}

/// Keep candidates for which `test` holds.
pub fn pass_test(
    name: impl Into<String>,
    test: impl Fn(&FileEntry) -> bool + Send + Sync + 'static,
) -> Rule {
    Rule::new(name, move |files| {
        files.iter().filter(|f| test(f)).cloned().collect()
    })
}

/// Keep candidates whose value lies within `±variance` of the best value.
///
/// Values are rounded to the nearest integer before comparison, and the band
/// is closed. Survivors keep their input order, so the result only depends on
/// the set of candidates. Candidates without a value rank below every
/// candidate with one; if no candidate has a value, all are kept.
pub fn min_max(
    name: impl Into<String>,
    value: impl Fn(&FileEntry) -> Option<f64> + Send + Sync + 'static,
    extreme: Extreme,
    variance: f64,
) -> Rule {
    let variance = variance.abs();
    Rule::new(name, move |files| {
        let rounded: Vec<Option<f64>> = files.iter().map(|f| value(f).map(f64::round)).collect();
        let present = rounded.iter().flatten().copied();
        let best = match extreme {
            Extreme::Min => present.reduce(f64::min),
            Extreme::Max => present.reduce(f64::max),
        };
        let Some(best) = best else {
            return files.to_vec();
        };
        let (lo, hi) = ((best - variance).round(), (best + variance).round());

        files
            .iter()
            .zip(&rounded)
            .filter(|(_, v)| v.is_some_and(|v| v >= lo && v <= hi))
            .map(|(f, _)| Arc::clone(f))
            .collect()
    })
}

/// Keep candidates matching the highest-ranked preference any candidate
/// matches. A candidate matching nothing ranks lowest; an empty preference
/// list keeps everyone.
pub fn preference_rank<T>(
    name: impl Into<String>,
    prefs: Vec<T>,
    matches: impl Fn(&FileEntry, &T) -> bool + Send + Sync + 'static,
    prefer: Prefer,
) -> Rule
where
    T: Send + Sync + 'static,
{
    let count = prefs.len();
    let score = move |file: &FileEntry| -> Option<f64> {
        let ranked: Box<dyn Iterator<Item = (usize, &T)>> = match prefer {
            Prefer::Front => Box::new(prefs.iter().enumerate()),
            Prefer::Back => Box::new(prefs.iter().enumerate().rev()),
        };
        let hit = ranked
            .into_iter()
            .find(|(_, pref)| matches(file, pref))
            .map(|(idx, _)| match prefer {
                Prefer::Front => count - idx,
                Prefer::Back => idx + 1,
            })
            .unwrap_or(0);
        Some(hit as f64)
    };
    if count == 0 {
        let name = name.into();
        return Rule::new(name, |files| files.to_vec());
    }
    min_max(name, score, Extreme::Max, 0.0)
}
