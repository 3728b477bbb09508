//! Filesystem stats: name, size and timestamps.
//!
//! This provider applies to every file and is always registered first. Its
//! default keep pipeline is the fallback for any group no other provider
//! claims.

use std::path::Path;
use std::time::SystemTime;

use bytesize::ByteSize;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

use super::{HashKey, Matcher, ProviderError, Stat, StatMap, StatProvider, StatValue};
use crate::duplicates::keeper::{KeepRules, KeepSettings};
use crate::duplicates::narrow::{min_max, preference_rank, Extreme, Prefer, Rule};
use crate::scanner::path_utils::is_under;

/// File stem.
pub const NAME: Stat = Stat::new("NAME", "Filename");
/// Size in bytes.
pub const SIZE: Stat = Stat::new("SIZE", "Size");
/// Creation time (falls back to modification time where unsupported).
pub const CTIME: Stat = Stat::new("CTIME", "Created");
/// Modification time.
pub const MTIME: Stat = Stat::new("MTIME", "Modified");

const STATS: &[Stat] = &[NAME, SIZE, CTIME, MTIME];

/// String form of timestamps.
pub const DATE_FORMAT: &str = "%m-%d-%Y %H:%M:%S";

/// Provider for basic filesystem metadata.
#[derive(Debug, Clone)]
pub struct FileProvider {
    min_name: usize,
    size_var: i64,
    time_var: i64,
}

impl FileProvider {
    /// Create the provider with its matching tolerances.
    #[must_use]
    pub fn new(min_name: usize, size_var: i64, time_var: i64) -> Self {
        Self {
            min_name,
            size_var,
            time_var,
        }
    }

    /// The filesystem default keep pipeline, shared by the other providers.
    #[must_use]
    pub fn default_rules(settings: &KeepSettings) -> Vec<Rule> {
        vec![
            max_size(settings),
            preferred_extension(settings),
            preferred_root(settings),
            shortest_name(),
            newest(MTIME, settings),
            min_max(
                "oldest ctime",
                |f| time_value(f, CTIME),
                Extreme::Min,
                settings.time_var as f64,
            ),
        ]
    }
}

impl Default for FileProvider {
    fn default() -> Self {
        Self::new(3, 0, 0)
    }
}

fn time_value(file: &crate::scanner::FileEntry, stat: Stat) -> Option<f64> {
    file.value(stat)
        .and_then(|v| v.as_time())
        .map(|t| to_epoch(t) as f64)
}

fn max_size(settings: &KeepSettings) -> Rule {
    min_max(
        "largest size",
        |f| f.value(SIZE).and_then(|v| v.as_f64()),
        Extreme::Max,
        settings.size_var as f64,
    )
}

fn newest(stat: Stat, settings: &KeepSettings) -> Rule {
    min_max(
        format!("newest {}", stat.name().to_lowercase()),
        move |f| time_value(f, stat),
        Extreme::Max,
        settings.time_var as f64,
    )
}

fn preferred_extension(settings: &KeepSettings) -> Rule {
    preference_rank(
        "preferred extension",
        settings.extensions.clone(),
        |f, ext: &String| f.extension() == *ext,
        Prefer::Front,
    )
}

fn preferred_root(settings: &KeepSettings) -> Rule {
    preference_rank(
        "preferred location",
        settings.roots.clone(),
        |f, root: &std::path::PathBuf| is_under(f.path(), root),
        Prefer::Front,
    )
}

fn shortest_name() -> Rule {
    min_max(
        "shortest name",
        |f| {
            f.value(NAME)
                .and_then(|v| v.as_text().map(|s| s.chars().count() as f64))
        },
        Extreme::Min,
        0.0,
    )
}

/// Local wall-clock time to epoch seconds.
pub(crate) fn to_epoch(time: NaiveDateTime) -> i64 {
    Local
        .from_local_datetime(&time)
        .earliest()
        .map_or_else(|| time.and_utc().timestamp(), |t| t.timestamp())
}

/// Epoch seconds to local wall-clock time.
pub(crate) fn from_epoch(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|utc| utc.with_timezone(&Local).naive_local())
}

/// Round a filesystem timestamp to the nearest second in local time.
fn round_time(time: SystemTime) -> Option<NaiveDateTime> {
    let local: DateTime<Local> = time.into();
    let secs = local.timestamp() + i64::from(local.timestamp_subsec_millis() >= 500);
    from_epoch(secs)
}

fn parse_time(stat: Stat, value: &str) -> Result<NaiveDateTime, ProviderError> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        return from_epoch(secs.round() as i64)
            .ok_or_else(|| ProviderError::parse(stat, value, "timestamp out of range"));
    }
    NaiveDateTime::parse_from_str(value, DATE_FORMAT).map_err(|e| ProviderError::parse(stat, value, e))
}

impl StatProvider for FileProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    fn stats(&self) -> &'static [Stat] {
        STATS
    }

    fn read_stats(&self, path: &Path) -> Result<StatMap, ProviderError> {
        let metadata = std::fs::metadata(path).map_err(|source| ProviderError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut stats = StatMap::new();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        stats.insert(NAME, StatValue::Text(stem));
        stats.insert(SIZE, StatValue::Int(metadata.len() as i64));

        let modified = metadata.modified().ok();
        if let Some(mtime) = modified.and_then(round_time) {
            stats.insert(MTIME, StatValue::Time(mtime));
        }
        if let Some(ctime) = metadata.created().ok().or(modified).and_then(round_time) {
            stats.insert(CTIME, StatValue::Time(ctime));
        }
        Ok(stats)
    }

    fn hash(&self, stat: Stat, value: &StatValue) -> Result<HashKey, ProviderError> {
        match (stat, value) {
            (NAME, StatValue::Text(s)) => Ok(HashKey::Text(s.to_lowercase())),
            (SIZE, StatValue::Int(n)) => Ok(HashKey::Int(*n)),
            (CTIME | MTIME, StatValue::Time(t)) => Ok(HashKey::Int(to_epoch(*t))),
            (NAME | SIZE | CTIME | MTIME, other) => Err(ProviderError::shape(stat, other)),
            _ => Err(ProviderError::UnknownStat {
                stat,
                provider: self.name(),
            }),
        }
    }

    fn from_str(&self, stat: Stat, value: &str) -> Result<StatValue, ProviderError> {
        match stat {
            NAME => Ok(StatValue::Text(value.to_string())),
            SIZE => {
                let trimmed = value.trim();
                trimmed
                    .parse::<i64>()
                    .or_else(|_| trimmed.parse::<ByteSize>().map(|b| b.as_u64() as i64))
                    .map(StatValue::Int)
                    .map_err(|e| ProviderError::parse(stat, value, e))
            }
            CTIME | MTIME => parse_time(stat, value).map(StatValue::Time),
            _ => Err(ProviderError::UnknownStat {
                stat,
                provider: self.name(),
            }),
        }
    }

    fn key_to_str(&self, stat: Stat, key: &HashKey) -> Result<String, ProviderError> {
        match (stat, key) {
            (NAME, HashKey::Text(s)) => Ok(s.clone()),
            (SIZE, HashKey::Int(n)) => Ok(n.to_string()),
            (CTIME | MTIME, HashKey::Int(secs)) => from_epoch(*secs)
                .map(|t| t.format(DATE_FORMAT).to_string())
                .ok_or_else(|| ProviderError::parse(stat, &secs.to_string(), "timestamp out of range")),
            _ => Err(ProviderError::parse(stat, &key.to_string(), "unexpected key shape")),
        }
    }

    fn matchers(&self) -> Vec<(Stat, Matcher)> {
        vec![
            (NAME, Matcher::Prefix { min_len: self.min_name }),
            (SIZE, Matcher::range(self.size_var)),
            (CTIME, Matcher::range(self.time_var)),
            (MTIME, Matcher::range(self.time_var)),
        ]
    }

    fn keep_rules(&self, settings: &KeepSettings) -> KeepRules {
        KeepRules {
            default: Some(Self::default_rules(settings)),
            per_stat: vec![(
                SIZE,
                vec![
                    newest(MTIME, settings),
                    preferred_extension(settings),
                    preferred_root(settings),
                    shortest_name(),
                ],
            )],
        }
    }
}
