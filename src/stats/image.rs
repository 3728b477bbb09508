//! Image stats: encoding, dimensions, perceptual hash and frame count.
//!
//! Only the perceptual hash is recommended for clustering. Encoding and
//! dimensions never cluster on their own; they exist to drive keep
//! selection. Frame counts only cluster animated images (more than one
//! frame) with identical counts.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageFormat, ImageReader};

use super::{Fingerprint, HashKey, Matcher, ProviderError, Stat, StatMap, StatProvider, StatValue};
use crate::duplicates::keeper::{KeepRules, KeepSettings};
use crate::duplicates::narrow::{min_max, preference_rank, Extreme, Prefer};
use crate::scanner::perceptual::{PerceptualAlgorithm, PerceptualHasher};
use crate::stats::file::FileProvider;

/// Container/codec name, e.g. `PNG`.
pub const ENCODING: Stat = Stat::new("ENCODING", "Encoding");
/// Width and height in pixels.
pub const DIMENSIONS: Stat = Stat::new("DIMENSIONS", "Dimensions");
/// Perceptual fingerprint.
pub const IMG_HASH: Stat = Stat::new("IMG_HASH", "Image Hash");
/// Number of animation frames.
pub const FRAMES: Stat = Stat::new("FRAMES", "Framecount");

const STATS: &[Stat] = &[ENCODING, DIMENSIONS, IMG_HASH, FRAMES];
const GROUP_BY: &[Stat] = &[IMG_HASH];

/// Extensions the enabled decoders can read.
const EXTENSIONS: &[&str] = &[".png", ".gif", ".bmp", ".dib", ".tif", ".tiff", ".webp"];

/// Provider for decoded image properties.
#[derive(Debug)]
pub struct ImageProvider {
    hasher: PerceptualHasher,
    threshold: f64,
}

impl ImageProvider {
    /// Create the provider.
    ///
    /// `precision` is the hash side length; `threshold` the similarity
    /// percentage two fingerprints need to match.
    #[must_use]
    pub fn new(algorithm: PerceptualAlgorithm, precision: u32, threshold: f64) -> Self {
        Self {
            hasher: PerceptualHasher::new(algorithm, precision),
            threshold: threshold.clamp(0.0, 100.0),
        }
    }

    fn decode_error(path: &Path, e: impl std::fmt::Display) -> ProviderError {
        ProviderError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    }

    fn frame_count(path: &Path, format: Option<ImageFormat>) -> Result<i64, ProviderError> {
        if format != Some(ImageFormat::Gif) {
            return Ok(1);
        }
        let file = File::open(path).map_err(|source| ProviderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let decoder =
            GifDecoder::new(BufReader::new(file)).map_err(|e| Self::decode_error(path, e))?;
        Ok(decoder.into_frames().count().max(1) as i64)
    }
}

impl Default for ImageProvider {
    fn default() -> Self {
        Self::new(PerceptualAlgorithm::default(), 8, 100.0)
    }
}

fn parse_dimensions(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

fn pixel_count(file: &crate::scanner::FileEntry) -> Option<f64> {
    match file.value(DIMENSIONS)? {
        StatValue::Dimensions { width, height } => Some(f64::from(width) * f64::from(height)),
        _ => None,
    }
}

impl StatProvider for ImageProvider {
    fn name(&self) -> &'static str {
        "image"
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
        let reader = ImageReader::open(path)
            .map_err(|source| ProviderError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .with_guessed_format()
            .map_err(|source| ProviderError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let format = reader.format();
        let image = reader.decode().map_err(|e| Self::decode_error(path, e))?;

        let mut stats = StatMap::new();
        if let Some(format) = format {
            stats.insert(
                ENCODING,
                StatValue::Text(format!("{format:?}").to_uppercase()),
            );
        }
        stats.insert(
            DIMENSIONS,
            StatValue::Dimensions {
                width: image.width(),
                height: image.height(),
            },
        );
        stats.insert(
            IMG_HASH,
            StatValue::Fingerprint(self.hasher.fingerprint(&image)),
        );
        stats.insert(FRAMES, StatValue::Int(Self::frame_count(path, format)?));
        Ok(stats)
    }

    fn hash(&self, stat: Stat, value: &StatValue) -> Result<HashKey, ProviderError> {
        match (stat, value) {
            (ENCODING, StatValue::Text(s)) => Ok(HashKey::Text(s.to_lowercase())),
            (DIMENSIONS, StatValue::Dimensions { width, height }) => {
                Ok(HashKey::Int(i64::from(*width) * i64::from(*height)))
            }
            (IMG_HASH, StatValue::Fingerprint(fp)) => Ok(HashKey::Fingerprint(fp.clone())),
            (FRAMES, StatValue::Int(n)) => Ok(HashKey::Int(*n)),
            (ENCODING | DIMENSIONS | IMG_HASH | FRAMES, other) => {
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
            ENCODING => Ok(StatValue::Text(value.trim().to_string())),
            DIMENSIONS => parse_dimensions(value)
                .map(|(width, height)| StatValue::Dimensions { width, height })
                .ok_or_else(|| ProviderError::parse(stat, value, "expected WIDTHxHEIGHT")),
            IMG_HASH => Fingerprint::from_hex(value)
                .map(StatValue::Fingerprint)
                .map_err(|e| ProviderError::parse(stat, value, e)),
            FRAMES => value
                .trim()
                .parse()
                .map(StatValue::Int)
                .map_err(|e| ProviderError::parse(stat, value, e)),
            _ => Err(ProviderError::UnknownStat {
                stat,
                provider: self.name(),
            }),
        }
    }

    fn key_to_str(&self, stat: Stat, key: &HashKey) -> Result<String, ProviderError> {
        match (stat, key) {
            (ENCODING, HashKey::Text(s)) => Ok(s.clone()),
            // A pixel count stands in as an N x 1 image.
            (DIMENSIONS, HashKey::Int(n)) => Ok(format!("{n}x1")),
            (IMG_HASH, HashKey::Fingerprint(fp)) => Ok(fp.to_hex()),
            (FRAMES, HashKey::Int(n)) => Ok(n.to_string()),
            _ => Err(ProviderError::parse(stat, &key.to_string(), "unexpected key shape")),
        }
    }

    fn matchers(&self) -> Vec<(Stat, Matcher)> {
        vec![
            (ENCODING, Matcher::Never),
            (DIMENSIONS, Matcher::Never),
            (
                IMG_HASH,
                Matcher::Bits {
                    threshold: self.threshold,
                },
            ),
            (FRAMES, Matcher::ExactAbove(1)),
        ]
    }

    fn keep_rules(&self, settings: &KeepSettings) -> KeepRules {
        let mut rules = vec![min_max(
            "most frames",
            |f| f.value(FRAMES).and_then(|v| v.as_f64()),
            Extreme::Max,
            0.0,
        )];
        rules.extend(FileProvider::default_rules(settings));
        rules.push(min_max(
            "largest dimensions",
            pixel_count,
            Extreme::Max,
            settings.dimension_var as f64,
        ));
        rules.push(preference_rank(
            "preferred codec",
            settings.img_codecs.clone(),
            |f, codec: &String| {
                f.value(ENCODING)
                    .and_then(|v| v.as_text().map(str::to_lowercase))
                    .is_some_and(|enc| enc == *codec)
            },
            Prefer::Front,
        ));
        KeepRules {
            default: Some(rules),
            per_stat: Vec::new(),
        }
    }
}
