//! Audio/video stats read through an external `ffprobe` process.
//!
//! The provider is opt-in: it is only registered when enabled in the
//! settings, because every file it accepts costs one child process. Each
//! probe runs with a timeout; a probe that does not answer in time is
//! killed and reported as a per-file failure.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde::Deserialize;

use super::{HashKey, Matcher, ProviderError, Stat, StatMap, StatProvider, StatValue};
use crate::duplicates::keeper::{KeepRules, KeepSettings};
use crate::duplicates::narrow::{min_max, preference_rank, Extreme, Prefer};
use crate::stats::file::FileProvider;

/// Primary media type: video, audio or data.
pub const MEDIA: Stat = Stat::new("MEDIA", "Media Type");
/// Container format long name.
pub const CONTAINER: Stat = Stat::new("CONTAINER", "Container");
/// Overall bitrate in bits per second.
pub const BITRATE: Stat = Stat::new("BITRATE", "Bitrate");
/// Duration in seconds.
pub const DURATION: Stat = Stat::new("DURATION", "Duration");
/// Sorted stream descriptors.
pub const STREAMS: Stat = Stat::new("STREAMS", "Streams");

const STATS: &[Stat] = &[MEDIA, CONTAINER, BITRATE, DURATION, STREAMS];
const GROUP_BY: &[Stat] = &[DURATION, STREAMS];

const EXTENSIONS: &[&str] = &[
    ".3g2", ".3gp", ".aac", ".aif", ".aiff", ".amr", ".ape", ".asf", ".avi", ".flac", ".flv",
    ".m2ts", ".m4a", ".m4b", ".m4v", ".mka", ".mkv", ".mov", ".mp2", ".mp3", ".mp4", ".mpeg",
    ".mpg", ".mts", ".ogg", ".ogv", ".opus", ".ts", ".vob", ".wav", ".webm", ".wma", ".wmv",
];

const STREAM_SEPARATOR: &str = " | ";

#[derive(Debug, Default, Deserialize)]
struct Probe {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    format_long_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    bit_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    disposition: Disposition,
}

#[derive(Debug, Default, Deserialize)]
struct Disposition {
    #[serde(default)]
    attached_pic: u8,
}

impl ProbeStream {
    fn kind(&self) -> &str {
        self.codec_type.as_deref().unwrap_or("data")
    }

    fn descriptor(&self) -> String {
        let mut parts = vec![
            self.kind().to_string(),
            self.codec_name.clone().unwrap_or_else(|| "unknown".into()),
        ];
        if let (Some(w), Some(h)) = (self.width, self.height) {
            parts.push(format!("{w}x{h}"));
        }
        parts.join(":")
    }
}

/// Provider backed by `ffprobe`.
#[derive(Debug, Clone)]
pub struct MediaProvider {
    program: String,
    timeout: Duration,
    duration_var: f64,
    bitrate_var: i64,
}

impl MediaProvider {
    /// Create the provider.
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration, duration_var: f64, bitrate_var: i64) -> Self {
        Self {
            program: program.into(),
            timeout,
            duration_var: duration_var.abs(),
            bitrate_var,
        }
    }

    fn run_probe(&self, path: &Path) -> Result<Probe, ProviderError> {
        let external = |reason: String| ProviderError::External {
            program: self.program.clone(),
            path: path.to_path_buf(),
            reason,
        };

        let mut child = Command::new(&self.program)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| external(e.to_string()))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| external("no stdout handle".into()))?;
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let result = stdout.read_to_end(&mut buf).map(|_| buf);
            // The receiver may have given up already.
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(output)) => {
                let status = child.wait().map_err(|e| external(e.to_string()))?;
                if !status.success() {
                    return Err(external(format!("exited with {status}")));
                }
                parse_probe(&output).map_err(|e| external(e.to_string()))
            }
            Ok(Err(e)) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(external(e.to_string()))
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(ProviderError::Timeout {
                    program: self.program.clone(),
                    path: path.to_path_buf(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

impl Default for MediaProvider {
    fn default() -> Self {
        Self::new("ffprobe", Duration::from_secs(30), 0.0, 0)
    }
}

fn parse_probe(output: &[u8]) -> Result<Probe, serde_json::Error> {
    serde_json::from_slice(output)
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| v.trim().parse::<f64>().ok())
}

/// Turn parsed probe output into stat values.
fn probe_stats(probe: &Probe, path: &Path) -> Result<StatMap, ProviderError> {
    let streams: Vec<&ProbeStream> = probe
        .streams
        .iter()
        .filter(|s| s.disposition.attached_pic == 0)
        .collect();
    if streams.is_empty() {
        return Err(ProviderError::Decode {
            path: PathBuf::from(path),
            reason: "no media streams".into(),
        });
    }

    let mut stats = StatMap::new();
    let media = ["video", "audio"]
        .into_iter()
        .find(|kind| streams.iter().any(|s| s.kind() == *kind))
        .unwrap_or("data");
    stats.insert(MEDIA, StatValue::Text(media.to_string()));

    let format = probe.format.as_ref();
    if let Some(name) = format.and_then(|f| f.format_long_name.clone()) {
        stats.insert(CONTAINER, StatValue::Text(name));
    }

    let duration = parse_number(format.and_then(|f| f.duration.as_deref())).or_else(|| {
        streams
            .iter()
            .filter_map(|s| parse_number(s.duration.as_deref()))
            .reduce(f64::max)
    });
    if let Some(duration) = duration {
        stats.insert(DURATION, StatValue::Float(duration));
    }

    let bitrate = parse_number(format.and_then(|f| f.bit_rate.as_deref())).or_else(|| {
        let rates: Vec<f64> = streams
            .iter()
            .filter_map(|s| parse_number(s.bit_rate.as_deref()))
            .collect();
        (!rates.is_empty()).then(|| rates.iter().sum())
    });
    if let Some(bitrate) = bitrate {
        stats.insert(BITRATE, StatValue::Int(bitrate.round() as i64));
    }

    let mut descriptors: Vec<String> = streams.iter().map(|s| s.descriptor()).collect();
    descriptors.sort();
    stats.insert(STREAMS, StatValue::List(descriptors));
    Ok(stats)
}

fn split_streams(value: &str) -> Vec<String> {
    value
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl StatProvider for MediaProvider {
    fn name(&self) -> &'static str {
        "media"
    }

    fn stats(&self) -> &'static [Stat] {
        STATS
    }

    fn group_by(&self) -> &'static [Stat] {
        GROUP_BY
    }

    fn extensions(&self) -> Option<&'static [&'static str]> {
        Some(EXTENSIONS)
    }

    fn read_stats(&self, path: &Path) -> Result<StatMap, ProviderError> {
        let probe = self.run_probe(path)?;
        probe_stats(&probe, path)
    }

    fn hash(&self, stat: Stat, value: &StatValue) -> Result<HashKey, ProviderError> {
        match (stat, value) {
            (MEDIA | CONTAINER, StatValue::Text(s)) => Ok(HashKey::Text(s.to_lowercase())),
            (BITRATE, StatValue::Int(n)) => Ok(HashKey::Int(*n)),
            (DURATION, StatValue::Float(secs)) => Ok(HashKey::Int((secs * 1000.0).round() as i64)),
            (DURATION, StatValue::Int(secs)) => Ok(HashKey::Int(secs.saturating_mul(1000))),
            (STREAMS, StatValue::List(items)) => {
                Ok(HashKey::Text(items.join(STREAM_SEPARATOR).to_lowercase()))
            }
            (MEDIA | CONTAINER | BITRATE | DURATION | STREAMS, other) => {
                Err(ProviderError::shape(stat, other))
            }
            _ => Err(ProviderError::UnknownStat {
                stat,
                provider: self.name(),
            }),
        }
    }

    fn from_str(&self, stat: Stat, value: &str) -> Result<StatValue, ProviderError> {
        match stat {
            MEDIA | CONTAINER => Ok(StatValue::Text(value.trim().to_string())),
            BITRATE => value
                .trim()
                .parse()
                .map(StatValue::Int)
                .map_err(|e| ProviderError::parse(stat, value, e)),
            DURATION => value
                .trim()
                .parse()
                .map(StatValue::Float)
                .map_err(|e| ProviderError::parse(stat, value, e)),
            STREAMS => Ok(StatValue::List(split_streams(value))),
            _ => Err(ProviderError::UnknownStat {
                stat,
                provider: self.name(),
            }),
        }
    }

    fn key_to_str(&self, stat: Stat, key: &HashKey) -> Result<String, ProviderError> {
        match (stat, key) {
            (MEDIA | CONTAINER | STREAMS, HashKey::Text(s)) => Ok(s.clone()),
            (BITRATE, HashKey::Int(n)) => Ok(n.to_string()),
            (DURATION, HashKey::Int(ms)) => Ok((*ms as f64 / 1000.0).to_string()),
            _ => Err(ProviderError::parse(stat, &key.to_string(), "unexpected key shape")),
        }
    }

    fn matchers(&self) -> Vec<(Stat, Matcher)> {
        vec![
            (DURATION, Matcher::range((self.duration_var * 1000.0).round() as i64)),
            (BITRATE, Matcher::range(self.bitrate_var)),
        ]
    }

    fn keep_rules(&self, settings: &KeepSettings) -> KeepRules {
        let mut rules = vec![
            min_max(
                "longest duration",
                |f| f.value(DURATION).and_then(|v| v.as_f64()),
                Extreme::Max,
                settings.duration_var,
            ),
            min_max(
                "most streams",
                |f| match f.value(STREAMS) {
                    Some(StatValue::List(items)) => Some(items.len() as f64),
                    _ => None,
                },
                Extreme::Max,
                0.0,
            ),
            min_max(
                "highest bitrate",
                |f| f.value(BITRATE).and_then(|v| v.as_f64()),
                Extreme::Max,
                settings.bitrate_var as f64,
            ),
        ];
        rules.extend(FileProvider::default_rules(settings));
        rules.push(preference_rank(
            "preferred container",
            settings.containers.clone(),
            |f, container: &String| {
                f.value(CONTAINER)
                    .and_then(|v| v.as_text().map(str::to_lowercase))
                    .is_some_and(|c| c.contains(container.as_str()))
            },
            Prefer::Front,
        ));
        KeepRules {
            default: Some(rules),
            per_stat: Vec::new(),
        }
    }
}
