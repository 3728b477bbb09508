//! Duplicate detection and review.
//!
//! This module provides functionality for:
//! - Clustering files along stat dimensions ([`finder`])
//! - Group management ([`groups`])
//! - Narrowing rules and automatic keep selection ([`narrow`], [`keeper`])
//! - Integrity checks and clean-up of loaded groups ([`sanitize`])

pub mod finder;
pub mod groups;
pub mod keeper;
pub mod narrow;
pub mod sanitize;

pub use finder::{DuplicateFinder, FinderConfig, FinderError, ScanSummary};
pub use groups::FileGroup;
pub use keeper::{AutoKeeper, KeepError, KeepOutcome, KeepRules, KeepSettings, KeepSummary};
pub use narrow::{Extreme, Prefer, Rule};
pub use sanitize::{check_data, clean_data, CleanOptions, CleanReport, IntegrityReport};
