//! Contract checks for stat providers.
//!
//! Providers must round-trip their values through strings: converting a value
//! to a string, parsing it back and converting again has to reproduce the
//! same string, and the same holds for clustering keys. [`validate_provider`]
//! reads sample files and reports every violation. Exact value equality after
//! a round trip is only a warning, since some representations (timestamps,
//! floats) are lossy by construction.

use std::fmt;
use std::path::PathBuf;

use super::{Stat, StatProvider, StatValue};

/// Outcome of validating one provider.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Contract violations
    pub errors: Vec<String>,
    /// Lossy but acceptable round trips
    pub warnings: Vec<String>,
    /// Samples the provider read successfully
    pub samples_read: usize,
}

impl ValidationReport {
    /// True when no contract violation was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} samples, {} errors, {} warnings",
            self.samples_read,
            self.errors.len(),
            self.warnings.len()
        )?;
        for e in &self.errors {
            writeln!(f, "  error: {e}")?;
        }
        for w in &self.warnings {
            writeln!(f, "  warning: {w}")?;
        }
        Ok(())
    }
}

/// Check `provider` against `samples`.
///
/// Samples the provider does not accept are ignored.
#[must_use]
pub fn validate_provider(provider: &dyn StatProvider, samples: &[PathBuf]) -> ValidationReport {
    let mut report = ValidationReport::default();

    if provider.stats().is_empty() {
        report
            .errors
            .push(format!("{} defines no stats", provider.name()));
    }
    for stat in provider.group_by().iter().chain(provider.hidden()) {
        if !provider.stats().contains(stat) {
            report
                .errors
                .push(format!("{stat} is referenced but not defined"));
        }
    }

    for path in samples {
        let stats = match provider.current_stats(path) {
            Ok(Some(stats)) => stats,
            Ok(None) => continue,
            Err(e) => {
                report.errors.push(format!("{}: {e}", path.display()));
                continue;
            }
        };
        report.samples_read += 1;
        for (stat, value) in &stats {
            check_value(provider, *stat, value, &path.display().to_string(), &mut report);
        }
    }
    report
}

fn check_value(
    provider: &dyn StatProvider,
    stat: Stat,
    value: &StatValue,
    origin: &str,
    report: &mut ValidationReport,
) {
    let first = provider.to_str(stat, value);
    match provider.from_str(stat, &first) {
        Ok(parsed) => {
            let second = provider.to_str(stat, &parsed);
            if first != second {
                report.errors.push(format!(
                    "{origin}: {stat} string traversal changed '{first}' into '{second}'"
                ));
            } else if parsed != *value {
                report.warnings.push(format!(
                    "{origin}: {stat} value {value:?} came back as {parsed:?}"
                ));
            }
        }
        Err(e) => report.errors.push(format!("{origin}: {e}")),
    }

    let key = match provider.hash(stat, value) {
        Ok(key) => key,
        Err(e) => {
            report.errors.push(format!("{origin}: {e}"));
            return;
        }
    };
    let result = provider
        .key_to_str(stat, &key)
        .and_then(|text| provider.str_to_key(stat, &text).map(|back| (text, back)));
    match result {
        Ok((_, back)) if back == key => {}
        Ok((text, back)) => report.errors.push(format!(
            "{origin}: {stat} key traversal turned {key} into '{text}' and back into {back}"
        )),
        Err(e) => report.errors.push(format!("{origin}: {e}")),
    }
}
