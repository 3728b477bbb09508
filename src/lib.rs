//! dupesieve - near-duplicate file clustering
//!
//! Files are described by pluggable *stats* (size, timestamps, perceptual
//! image hash, media duration, ...) and clustered independently along each
//! requested stat with tolerance-aware matching. Groups are saved to an
//! editable CSV snapshot, a keep engine marks the copy to retain in each
//! group, and the remaining files can be listed for removal. Scans are
//! logged as they go and can resume after an interruption.
//!
//! The crate never deletes or moves files.

pub mod cli;
pub mod config;
pub mod deduper;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod session;
pub mod signal;
pub mod stats;

use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::cli::{Cli, Commands, ScanArgs};
use crate::config::Settings;
use crate::deduper::Deduper;
use crate::duplicates::CleanOptions;
use crate::scanner::path_utils;
use crate::error::ExitCode;
use crate::progress::{Progress, ProgressCallback};

/// Run one CLI invocation.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Err(e) = logging::init_logging(cli.verbose, cli.quiet) {
        eprintln!("Logging unavailable: {e}");
    }
    let settings =
        Settings::load(cli.config.as_deref(), &cli.settings).context("Failed to load configuration")?;
    log::trace!("Settings: {:?}", settings);

    match cli.command {
        Commands::Scan(ref args) => run_scan(&cli, args, settings),
        Commands::Keep(ref args) => {
            let mut deduper = load(&cli.snapshot, settings, args.roots.clone())?;
            deduper.clean(CleanOptions {
                roots: args.roots.clone(),
                ..CleanOptions::default()
            });
            deduper.auto_keep()?;
            save(&deduper, &cli.snapshot)?;
            Ok(ExitCode::Success)
        }
        Commands::Reset(ref args) => {
            let deduper = load(&cli.snapshot, settings, Vec::new())?;
            let changed = deduper.reset_keep(args.value);
            log::info!("Changed {} keep marks", changed);
            save(&deduper, &cli.snapshot)?;
            Ok(ExitCode::Success)
        }
        Commands::Clean(ref args) => {
            let mut deduper = load(&cli.snapshot, settings, Vec::new())?;
            let report = deduper.clean(deduper.clean_options(args.filter));
            log::info!(
                "Removed {} files and {} groups",
                report.files_removed,
                report.groups_removed
            );
            save(&deduper, &cli.snapshot)?;
            Ok(ExitCode::Success)
        }
        Commands::Check(ref args) => {
            let roots: Vec<_> = args.roots.iter().map(|r| path_utils::canonical(r)).collect();
            let mut deduper = load(&cli.snapshot, settings, roots)?;
            let report = deduper.integrity_check();
            if args.list {
                for path in report.short_paths(deduper.roots()) {
                    println!("{}", path.display());
                }
            }
            println!(
                "{} files to remove across {} groups",
                report.unique_paths().len(),
                report.groups
            );
            if report.is_complete() {
                Ok(ExitCode::Success)
            } else {
                Ok(ExitCode::PartialSuccess)
            }
        }
        Commands::Rmstr => {
            let mut deduper = load(&cli.snapshot, settings, Vec::new())?;
            match deduper.removal_command() {
                Some(command) => println!("{command}"),
                None => log::info!("Nothing to remove"),
            }
            Ok(ExitCode::Success)
        }
    }
}

fn run_scan(cli: &Cli, args: &ScanArgs, settings: Settings) -> anyhow::Result<ExitCode> {
    let handler = signal::install_handler().context("Failed to install Ctrl+C handler")?;
    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(cli.quiet));
    let mut deduper = Deduper::new(settings, args.roots.clone())?
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(progress);

    let resume = if args.fresh || !deduper.can_resume() {
        false
    } else {
        args.resume || confirm("An interrupted scan was found. Resume it?", true)
    };

    let summary = deduper.scan(resume).context("Scan failed")?;
    log::info!(
        "{} groups, {} files ({}) grouped; {} files scanned, {} recovered, {} skipped",
        summary.groups,
        summary.grouped_files,
        summary.grouped_size_display(),
        summary.files_scanned,
        summary.files_recovered,
        summary.files_skipped
    );
    for err in &summary.scan_errors {
        log::warn!("{}", err);
    }

    let overwrite = args.yes
        || !cli.snapshot.exists()
        || confirm(
            &format!("{} exists. Overwrite it?", cli.snapshot.display()),
            false,
        );
    if !overwrite {
        log::warn!("Snapshot not saved; rerun with --resume to reuse the scan log");
        return Ok(ExitCode::GeneralError);
    }
    deduper
        .save_snapshot(&cli.snapshot, true)
        .with_context(|| format!("Failed to save {}", cli.snapshot.display()))?;

    Ok(if deduper.groups().is_empty() {
        ExitCode::NoDuplicates
    } else if summary.has_errors() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}

fn load(snapshot: &Path, settings: Settings, roots: Vec<std::path::PathBuf>) -> anyhow::Result<Deduper> {
    let mut deduper = Deduper::new(settings, roots)?;
    deduper
        .load_snapshot(snapshot)
        .with_context(|| format!("Failed to load {}", snapshot.display()))?;
    Ok(deduper)
}

fn save(deduper: &Deduper, snapshot: &Path) -> anyhow::Result<()> {
    deduper
        .save_snapshot(snapshot, true)
        .with_context(|| format!("Failed to save {}", snapshot.display()))
}

/// Ask a yes/no question on stderr; non-interactive runs take `default`.
fn confirm(question: &str, default: bool) -> bool {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return default;
    }
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{question} {hint} ");
    let _ = stderr.flush();

    let mut answer = String::new();
    if stdin.lock().read_line(&mut answer).is_err() {
        return default;
    }
    match answer.trim().to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}
