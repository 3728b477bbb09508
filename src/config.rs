//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. built-in defaults ([`Settings::default`])
//! 2. a TOML file (`--config PATH`, else `config.toml` in the platform
//!    config directory when present)
//! 3. `DUPESIEVE_*` environment variables
//! 4. command-line overrides
//!
//! # Example
//!
//! ```toml
//! extensions = [".png", ".gif"]
//! group_by = ["IMG_HASH"]
//! threshold = 95.0
//! rm_paths = ["/photos/inbox"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::KeepSettings;
use crate::scanner::perceptual::PerceptualAlgorithm;
use crate::scanner::{path_utils, WalkerConfig};
use crate::stats::file::FileProvider;
use crate::stats::image::ImageProvider;
use crate::stats::media::MediaProvider;
use crate::stats::{Registry, RegistryError, StatProvider};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DUPESIEVE_";

/// Errors raised while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed or merged.
    #[error("Invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("Invalid value for '{key}': {reason}")]
    Invalid {
        /// Setting name
        key: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Every tunable setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Allowed extensions, also the keep preference order; `None` allows all
    pub extensions: Option<Vec<String>>,
    /// File names skipped silently
    pub ignore: Vec<String>,
    /// Stats to group by; empty uses every registered stat's default
    pub group_by: Vec<String>,
    /// Size tolerance in bytes
    pub size_var: i64,
    /// Timestamp tolerance in seconds
    pub time_var: i64,
    /// Shortest name prefix that counts as a name match
    pub min_name: usize,
    /// Perceptual hash similarity in percent
    pub threshold: f64,
    /// Perceptual hash side length
    pub precision: u32,
    /// Perceptual hash algorithm
    pub hash_alg: PerceptualAlgorithm,
    /// Pixel-count tolerance
    pub dimension_var: i64,
    /// Duration tolerance in seconds
    pub duration_var: f64,
    /// Bitrate tolerance in bits per second
    pub bitrate_var: i64,
    /// Preferred image encodings, best first
    pub img_codecs: Vec<String>,
    /// Preferred media containers, best first
    pub containers: Vec<String>,
    /// Files under these paths are never auto-kept
    pub rm_paths: Vec<PathBuf>,
    /// Scan log location
    pub log_path: PathBuf,
    /// Fold matching clusters after a scan
    pub combine: bool,
    /// Minimum shared stats for `clean --filter`
    pub clean_filter: usize,
    /// Probe threads
    pub io_threads: usize,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
    /// ffprobe binary
    pub ffprobe: String,
    /// Seconds before an ffprobe call is abandoned
    pub probe_timeout_secs: u64,
    /// Register the media provider
    pub media: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extensions: None,
            ignore: vec![".DS_Store".to_string(), "Thumbs.db".to_string()],
            group_by: Vec::new(),
            size_var: 0,
            time_var: 0,
            min_name: 3,
            threshold: 100.0,
            precision: 8,
            hash_alg: PerceptualAlgorithm::default(),
            dimension_var: 0,
            duration_var: 0.0,
            bitrate_var: 0,
            img_codecs: Vec::new(),
            containers: Vec::new(),
            rm_paths: Vec::new(),
            log_path: default_log_path(),
            combine: true,
            clean_filter: 0,
            io_threads: 4,
            follow_symlinks: false,
            ffprobe: "ffprobe".to_string(),
            probe_timeout_secs: 30,
            media: false,
        }
    }
}

impl Settings {
    /// Default and file/environment layers.
    ///
    /// A missing default config file is ignored; a missing explicit one is
    /// an error.
    pub fn figment(config: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        match config {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = default_config_path() {
                    log::debug!("Looking for config at {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Load settings, applying `overrides` (fields serialized as absent are
    /// left alone) on top of every other layer.
    pub fn load<T: Serialize>(config: Option<&Path>, overrides: &T) -> Result<Self, ConfigError> {
        let settings: Settings = Self::figment(config)?
            .merge(Serialized::defaults(overrides))
            .extract()
            .map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(ConfigError::Invalid {
                key: "threshold",
                reason: format!("{} is not a percentage", self.threshold),
            });
        }
        if self.precision < 2 {
            return Err(ConfigError::Invalid {
                key: "precision",
                reason: "must be at least 2".to_string(),
            });
        }
        for (key, value) in [
            ("size_var", self.size_var),
            ("time_var", self.time_var),
            ("dimension_var", self.dimension_var),
            ("bitrate_var", self.bitrate_var),
        ] {
            if value < 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must not be negative".to_string(),
                });
            }
        }
        if self.duration_var < 0.0 {
            return Err(ConfigError::Invalid {
                key: "duration_var",
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// Registry of the enabled providers: file, image, then media.
    pub fn build_registry(&self) -> Result<Registry, RegistryError> {
        let mut providers: Vec<Box<dyn StatProvider>> = vec![
            Box::new(FileProvider::new(self.min_name, self.size_var, self.time_var)),
            Box::new(ImageProvider::new(self.hash_alg, self.precision, self.threshold)),
        ];
        if self.media {
            providers.push(Box::new(MediaProvider::new(
                self.ffprobe.clone(),
                Duration::from_secs(self.probe_timeout_secs),
                self.duration_var,
                self.bitrate_var,
            )));
        }
        Registry::new(providers)
    }

    /// Keep preferences; `roots` is the preferred-location order.
    #[must_use]
    pub fn keep_settings(&self, roots: &[PathBuf]) -> KeepSettings {
        KeepSettings {
            extensions: self.extensions.clone().unwrap_or_default(),
            roots: roots.iter().map(|r| path_utils::canonical(r)).collect(),
            size_var: self.size_var,
            time_var: self.time_var,
            dimension_var: self.dimension_var,
            duration_var: self.duration_var,
            bitrate_var: self.bitrate_var,
            img_codecs: self.img_codecs.clone(),
            containers: self.containers.clone(),
            rm_paths: self.rm_paths.iter().map(|p| path_utils::canonical(p)).collect(),
        }
        .normalized()
    }

    /// Walk filters.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::new(self.extensions.as_deref(), &self.ignore, self.follow_symlinks)
    }
}

/// `config.toml` in the platform config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "dupesieve", "dupesieve").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn default_log_path() -> PathBuf {
    std::env::temp_dir().join(".dupesieve-scan.log")
}
