//! Comparison dimensions ("stats") and the providers that compute them.
//!
//! A [`Stat`] names one independently comparable property of a file, such as
//! its size or the perceptual hash of its pixels. Every stat belongs to exactly
//! one [`StatProvider`], which knows how to:
//!
//! - read the current value of each of its stats from disk,
//! - project a value onto a clustering key ([`HashKey`]),
//! - convert values to and from the strings stored in snapshots and scan logs,
//! - decide which of its stats are worth clustering on,
//! - contribute keep-selection rules for groups clustered on its stats.
//!
//! Providers are collected into an explicit [`Registry`] that is built once and
//! passed by reference to the scanner, the file factory and the keep engine.
//!
//! # Architecture
//!
//! - [`matcher`]: equivalence predicates between hash keys
//! - [`registry`]: provider registration, collision checks, the matcher map
//! - [`validate`]: round-trip contract checks for provider test suites
//! - [`file`], [`image`], [`media`]: built-in providers

pub mod file;
pub mod image;
pub mod matcher;
pub mod media;
pub mod registry;
pub mod validate;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::duplicates::keeper::{KeepRules, KeepSettings};

pub use matcher::Matcher;
pub use registry::{Registry, RegistryError};

/// Identifier of one comparison dimension.
///
/// `name` is the machine identifier written to the `Type` column of snapshots
/// and logs; `label` is the column header. Both are matched case-insensitively
/// when parsing, so they must be unique across the whole registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Stat {
    name: &'static str,
    label: &'static str,
}

impl Stat {
    /// Define a new stat.
    #[must_use]
    pub const fn new(name: &'static str, label: &'static str) -> Self {
        Self { name, label }
    }

    /// Machine identifier (e.g. `SIZE`).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Display label and column header (e.g. `Size`).
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Check whether `ident` names this stat by identifier or label.
    #[must_use]
    pub fn is(&self, ident: &str) -> bool {
        let ident = ident.trim();
        self.name.eq_ignore_ascii_case(ident) || self.label.eq_ignore_ascii_case(ident)
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Immutable per-file snapshot of stat values.
pub type StatMap = BTreeMap<Stat, StatValue>;

/// Raw value of a stat as read from disk or parsed from a string.
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    /// Free text (file stem, container name, ...).
    Text(String),
    /// Whole number (bytes, frame count, bitrate).
    Int(i64),
    /// Real number (duration in seconds).
    Float(f64),
    /// Local wall-clock time rounded to the second.
    Time(NaiveDateTime),
    /// Pixel dimensions.
    Dimensions {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// Perceptual fingerprint.
    Fingerprint(Fingerprint),
    /// Ordered list of descriptors (media streams).
    List(Vec<String>),
}

impl StatValue {
    /// Integer payload, if this is an integer.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric payload as `f64` for integer and float values.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Text payload, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Time payload, if this is a timestamp.
    #[must_use]
    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Time(_) => "time",
            Self::Dimensions { .. } => "dimensions",
            Self::Fingerprint(_) => "fingerprint",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Time(t) => write!(f, "{}", t.format(file::DATE_FORMAT)),
            Self::Dimensions { width, height } => write!(f, "{width}x{height}"),
            Self::Fingerprint(fp) => f.write_str(&fp.to_hex()),
            Self::List(items) => f.write_str(&items.join(" | ")),
        }
    }
}

/// Orderable projection of a stat value used as a clustering key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashKey {
    /// Normalised text.
    Text(String),
    /// Whole number.
    Int(i64),
    /// Perceptual fingerprint compared by bit distance.
    Fingerprint(Fingerprint),
}

impl HashKey {
    /// Integer payload, if any.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Fingerprint(fp) => f.write_str(&fp.to_hex()),
        }
    }
}

/// Packed perceptual hash bits.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    bytes: Vec<u8>,
}

impl Fingerprint {
    /// Wrap packed hash bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Packed bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bits in the hash.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.bytes.len() * 8
    }

    /// True for a zero-length hash.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hamming distance, or `None` when the hash sizes differ.
    #[must_use]
    pub fn distance(&self, other: &Self) -> Option<u32> {
        if self.bytes.len() != other.bytes.len() {
            return None;
        }
        Some(
            self.bytes
                .iter()
                .zip(&other.bytes)
                .map(|(a, b)| (a ^ b).count_ones())
                .sum(),
        )
    }

    /// Lowercase hexadecimal form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse the hexadecimal form produced by [`Fingerprint::to_hex`].
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        let hex = hex.trim();
        if hex.len() % 2 != 0 {
            return Err(format!("odd hex length {}", hex.len()));
        }
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| {
                hex.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| format!("invalid hex digits at offset {i}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { bytes })
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

/// Errors raised by stat providers.
///
/// A provider declining a file is not an error: see
/// [`StatProvider::current_stats`].
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    /// The stat is not owned by the provider that was asked about it.
    #[error("{stat} is not handled by the {provider} provider")]
    UnknownStat {
        /// Requested stat
        stat: Stat,
        /// Provider asked
        provider: &'static str,
    },

    /// A stored string could not be converted back into a value.
    #[error("Cannot parse {stat} value '{value}': {reason}")]
    Parse {
        /// Stat being parsed
        stat: Stat,
        /// Offending string
        value: String,
        /// Parser message
        reason: String,
    },

    /// A value of the wrong shape was handed to the provider.
    #[error("{stat} cannot use a {shape} value")]
    Shape {
        /// Stat being projected
        stat: Stat,
        /// Shape of the offending value
        shape: &'static str,
    },

    /// Reading the file failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file content could not be decoded.
    #[error("Failed to decode {path}: {reason}")]
    Decode {
        /// File being decoded
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// An external probing process failed.
    #[error("{program} failed for {path}: {reason}")]
    External {
        /// Program that was run
        program: String,
        /// File being probed
        path: PathBuf,
        /// Failure description
        reason: String,
    },

    /// An external probing process did not finish in time.
    #[error("{program} timed out after {seconds}s for {path}")]
    Timeout {
        /// Program that was run
        program: String,
        /// File being probed
        path: PathBuf,
        /// Timeout that elapsed
        seconds: u64,
    },
}

impl ProviderError {
    pub(crate) fn shape(stat: Stat, value: &StatValue) -> Self {
        Self::Shape {
            stat,
            shape: value.shape(),
        }
    }

    pub(crate) fn parse(stat: Stat, value: &str, reason: impl fmt::Display) -> Self {
        Self::Parse {
            stat,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A pluggable source of stats.
///
/// Implementations are immutable after construction: settings such as
/// variances and thresholds are captured by the constructor, so the same
/// provider always answers the same way for the lifetime of a [`Registry`].
pub trait StatProvider: Send + Sync {
    /// Short provider name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Every stat this provider defines.
    fn stats(&self) -> &'static [Stat];

    /// Stats recommended for clustering. Defaults to all of them.
    fn group_by(&self) -> &'static [Stat] {
        self.stats()
    }

    /// Stats left out of the default snapshot header.
    fn hidden(&self) -> &'static [Stat] {
        &[]
    }

    /// Lowercase extensions (with the leading dot) this provider handles,
    /// or `None` to handle every file.
    fn extensions(&self) -> Option<&'static [&'static str]> {
        None
    }

    /// Check whether the provider applies to `path`.
    fn accepts(&self, path: &Path) -> bool {
        match self.extensions() {
            None => true,
            Some(exts) => {
                let ext = crate::scanner::path_utils::dotted_extension(path);
                exts.iter().any(|e| *e == ext)
            }
        }
    }

    /// Read every stat of this provider from the file at `path`.
    ///
    /// Only called for paths the provider [accepts](StatProvider::accepts).
    fn read_stats(&self, path: &Path) -> Result<StatMap, ProviderError>;

    /// Current values for `path`, or `Ok(None)` when the provider does not
    /// apply to the file.
    fn current_stats(&self, path: &Path) -> Result<Option<StatMap>, ProviderError> {
        if !self.accepts(path) {
            return Ok(None);
        }
        self.read_stats(path).map(Some)
    }

    /// Project a value onto its clustering key.
    fn hash(&self, stat: Stat, value: &StatValue) -> Result<HashKey, ProviderError>;

    /// Convert a value to its display/storage string.
    fn to_str(&self, _stat: Stat, value: &StatValue) -> String {
        value.to_string()
    }

    /// Parse a string produced by [`StatProvider::to_str`].
    fn from_str(&self, stat: Stat, value: &str) -> Result<StatValue, ProviderError>;

    /// Convert a clustering key to the string of an equivalent value.
    fn key_to_str(&self, stat: Stat, key: &HashKey) -> Result<String, ProviderError>;

    /// Parse a string produced by [`StatProvider::key_to_str`] back into a key.
    fn str_to_key(&self, stat: Stat, value: &str) -> Result<HashKey, ProviderError> {
        self.hash(stat, &self.from_str(stat, value)?)
    }

    /// Equivalence predicates overriding exact key equality.
    fn matchers(&self) -> Vec<(Stat, Matcher)> {
        Vec::new()
    }

    /// Keep-selection pipelines contributed by this provider.
    fn keep_rules(&self, _settings: &KeepSettings) -> KeepRules {
        KeepRules::default()
    }
}
