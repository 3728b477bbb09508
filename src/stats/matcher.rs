//! Equivalence predicates between clustering keys.
//!
//! Matchers are not required to be transitive: two keys may each match a
//! third without matching each other. Clustering therefore always compares
//! against a group's first key, never against every member.

use super::HashKey;

/// How two keys of the same stat are compared.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Plain key equality.
    Exact,
    /// Nothing matches, not even identical keys.
    Never,
    /// Equal integer keys strictly above the floor.
    ExactAbove(i64),
    /// Integer keys within `±variance` of each other (inclusive).
    Range(i64),
    /// Text keys sharing a prefix as long as the shorter key.
    ///
    /// Keys shorter than `min_len`, or whose lengths differ by at least the
    /// shorter length, must be exactly equal.
    Prefix {
        /// Shortest key allowed to match by prefix
        min_len: usize,
    },
    /// Fingerprints whose bit distance stays within `(1 - threshold/100)` of
    /// their length. A threshold of 100 requires identical bits.
    Bits {
        /// Similarity percentage in `0..=100`
        threshold: f64,
    },
}

impl Matcher {
    /// Range matcher that degenerates to [`Matcher::Exact`] for zero variance.
    #[must_use]
    pub fn range(variance: i64) -> Self {
        if variance == 0 {
            Self::Exact
        } else {
            Self::Range(variance.abs())
        }
    }

    /// Compare two keys.
    #[must_use]
    pub fn matches(&self, a: &HashKey, b: &HashKey) -> bool {
        match self {
            Self::Exact => a == b,
            Self::Never => false,
            Self::ExactAbove(floor) => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => x == y && x > *floor,
                _ => false,
            },
            Self::Range(variance) => match (a, b) {
                (HashKey::Int(x), HashKey::Int(y)) => {
                    y.saturating_sub(*x).saturating_abs() <= *variance
                }
                _ => a == b,
            },
            Self::Prefix { min_len } => match (a, b) {
                (HashKey::Text(x), HashKey::Text(y)) => prefix_match(x, y, *min_len),
                _ => a == b,
            },
            Self::Bits { threshold } => match (a, b) {
                (HashKey::Fingerprint(x), HashKey::Fingerprint(y)) if !x.is_empty() => {
                    let limit = ((1.0 - threshold / 100.0) * x.bits() as f64).max(0.0) as u32;
                    x.distance(y).is_some_and(|d| d <= limit)
                }
                _ => false,
            },
        }
    }
}

fn prefix_match(a: &str, b: &str, min_len: usize) -> bool {
    let (len_a, len_b) = (a.chars().count(), b.chars().count());
    let (least, most) = (len_a.min(len_b), len_a.max(len_b));
    if least < min_len || most - least >= least {
        return a == b;
    }
    a.chars().take(least).eq(b.chars().take(least))
}
