//! Diagnostics output.
//!
//! Everything in the crate reports through the `log` facade; this module
//! installs the `env_logger` backend for the binary. The level comes from
//! `RUST_LOG` when set, else from the CLI flags:
//!
//! | flags     | level |
//! |-----------|-------|
//! | `--quiet` | error |
//! | (none)    | info  |
//! | `-v`      | debug |
//! | `-vv`     | trace |
//!
//! Debug builds prefix every line with a timestamp (and, from `-v`, the
//! module path); release builds print the level and message only.

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::{LevelFilter, SetLoggerError};

/// Install the logger.
///
/// Fails when a logger is already installed, e.g. on a second call.
pub fn init_logging(verbose: u8, quiet: bool) -> Result<(), SetLoggerError> {
    let from_env = env::var("RUST_LOG").is_ok();
    let mut builder = Builder::new();
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level_for(verbose, quiet));
    }
    configure_format(&mut builder, verbose);
    builder.try_init()?;

    if from_env {
        log::debug!("Log level taken from RUST_LOG");
    } else {
        log::debug!("Log level: {}", level_for(verbose, quiet));
    }
    Ok(())
}

/// Level selected by the CLI flags. `quiet` wins over `verbose`.
#[must_use]
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

#[cfg(debug_assertions)]
fn configure_format(builder: &mut Builder, verbose: u8) {
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        let timestamp = buf.timestamp_seconds();
        if verbose >= 1 {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                timestamp,
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(buf, "{} {style}{:<5}{style:#} {}", timestamp, level, record.args())
        }
    });
}

#[cfg(not(debug_assertions))]
fn configure_format(builder: &mut Builder, _verbose: u8) {
    builder.format(|buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
    });
}
