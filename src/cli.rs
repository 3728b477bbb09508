//! Command-line interface definitions.
//!
//! Every subcommand works on one snapshot CSV (`--snapshot`, default
//! `./results.csv`). Settings flags are global and override the config file
//! and environment.
//!
//! # Example
//!
//! ```bash
//! # Group images by perceptual hash, 95% similar
//! dupesieve --group-by IMG_HASH --threshold 95 scan ~/Pictures
//!
//! # Pick a file to keep in every group, then review results.csv
//! dupesieve keep --root ~/Pictures/originals
//!
//! # Print the removal command for everything not kept
//! dupesieve rmstr
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

/// Near-duplicate file finder with resumable scans and rule-based keep selection.
#[derive(Debug, Parser)]
#[command(name = "dupesieve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Config file (TOML); defaults to the platform config directory
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot CSV read and written by every subcommand
    #[arg(long, value_name = "PATH", global = true, default_value = "results.csv")]
    pub snapshot: PathBuf,

    /// Setting overrides
    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan directories and save the groups
    Scan(ScanArgs),
    /// Mark one file to keep in every group without a selection
    Keep(KeepArgs),
    /// Clear (or set) every keep mark
    Reset(ResetArgs),
    /// Drop vanished files, singleton groups and fully kept groups
    Clean(CleanArgs),
    /// Check that every group has a kept file
    Check(CheckArgs),
    /// Print a shell command removing every file not kept
    Rmstr,
}

/// Arguments for `scan`.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directories to scan, in preference order
    #[arg(value_name = "PATH", required = true)]
    pub roots: Vec<PathBuf>,

    /// Resume an interrupted scan without asking
    #[arg(long, conflicts_with = "fresh")]
    pub resume: bool,

    /// Discard any interrupted scan without asking
    #[arg(long)]
    pub fresh: bool,

    /// Overwrite an existing snapshot without asking
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Arguments for `keep`.
#[derive(Debug, Args)]
pub struct KeepArgs {
    /// Preferred locations, best first
    #[arg(long = "root", value_name = "PATH")]
    pub roots: Vec<PathBuf>,
}

/// Arguments for `check`.
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Show listed files relative to these directories
    #[arg(long = "root", value_name = "PATH")]
    pub roots: Vec<PathBuf>,

    /// List every file that would be removed
    #[arg(short, long)]
    pub list: bool,
}

/// Arguments for `reset`.
#[derive(Debug, Args)]
pub struct ResetArgs {
    /// Mark every file as kept instead of clearing the marks
    #[arg(long)]
    pub value: bool,
}

/// Arguments for `clean`.
#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Also drop files sharing fewer than `clean_filter` stats with every peer
    #[arg(long)]
    pub filter: bool,
}

/// Setting overrides; unset flags leave lower layers untouched.
#[derive(Debug, Default, Args, Serialize)]
pub struct SettingsArgs {
    /// Stats to group by (comma separated)
    #[arg(long, value_name = "STATS", value_delimiter = ',', global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<String>>,

    /// Allowed extensions, best first (comma separated)
    #[arg(long = "ext", value_name = "EXTS", value_delimiter = ',', global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,

    /// File names to skip (comma separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',', global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<Vec<String>>,

    /// Size tolerance in bytes
    #[arg(long, value_name = "BYTES", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_var: Option<i64>,

    /// Timestamp tolerance in seconds
    #[arg(long, value_name = "SECS", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_var: Option<i64>,

    /// Shortest matching name prefix
    #[arg(long, value_name = "N", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_name: Option<usize>,

    /// Perceptual hash similarity percentage
    #[arg(long, value_name = "PERCENT", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,

    /// Perceptual hash side length
    #[arg(long, value_name = "N", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,

    /// Perceptual hash algorithm
    #[arg(long, value_name = "ALG", value_parser = ["ahash", "phash", "dhash"], global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_alg: Option<String>,

    /// Files under this path are never auto-kept (repeatable)
    #[arg(long = "rm-path", value_name = "PATH", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rm_paths: Option<Vec<PathBuf>>,

    /// Scan log location
    #[arg(long, value_name = "PATH", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Fold matching groups after a scan (`--combine=false` to disable)
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combine: Option<bool>,

    /// Probe threads
    #[arg(long, value_name = "N", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_threads: Option<usize>,

    /// Enable the ffprobe-backed media stats
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<bool>,

    /// ffprobe binary
    #[arg(long, value_name = "PROGRAM", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffprobe: Option<String>,
}
