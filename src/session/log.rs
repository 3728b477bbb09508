//! Append-only scan log for resuming interrupted scans.
//!
//! # Format
//!
//! The log uses the same columns as a snapshot, with every registered stat
//! present. The Group column holds the row kind:
//!
//! - `FILE`: a processed file with all of its stat values
//! - `KEY`: the file from the preceding `FILE` row joined the cluster whose
//!   key is stored in the column of the stat named in the Type column
//! - `SKIP`: the extension in the Type column is not allowed
//!
//! Each file's `FILE` and `KEY` rows are written with one `write_all` and a
//! flush, so an interruption never leaves a partial record behind.
//!
//! # Example
//!
//! ```no_run
//! use dupesieve::config::Settings;
//! use dupesieve::session::ScanLog;
//! use std::path::Path;
//!
//! let registry = Settings::default().build_registry().unwrap();
//! let (log, recovered) = ScanLog::resume(Path::new("/tmp/.scan.log"), &registry).unwrap();
//! println!("{} files already scanned", recovered.visited.len());
//! # drop(log);
//! ```

use std::collections::{BTreeSet, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::StringRecord;

use super::table::{Column, Header};
use crate::scanner::path_utils::normalize_extension;
use crate::scanner::{FileEntry, FileRef};
use crate::stats::{HashKey, Registry, Stat};

const FILE_ROW: &str = "FILE";
const KEY_ROW: &str = "KEY";
const SKIP_ROW: &str = "SKIP";

/// Errors raised while reading or writing the scan log.
#[derive(thiserror::Error, Debug)]
pub enum LogError {
    /// Opening, writing or deleting the log failed.
    #[error("Scan log I/O error for {path}: {source}")]
    Io {
        /// Log path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Encoding or decoding a row failed.
    #[error("Scan log CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One replayed cluster membership.
#[derive(Debug, Clone)]
pub struct RecoveredKey {
    /// Dimension
    pub stat: Stat,
    /// Cluster key as logged
    pub key: HashKey,
    /// Member
    pub file: FileRef,
}

/// State reconstructed from an existing log.
#[derive(Debug, Default)]
pub struct Recovered {
    /// Cluster memberships in log order
    pub entries: Vec<RecoveredKey>,
    /// Paths already processed
    pub visited: HashSet<PathBuf>,
    /// Extensions already reported as skipped
    pub skipped: BTreeSet<String>,
    /// Rows that could not be used
    pub malformed: usize,
}

/// Writer side of the scan log. A disabled log accepts and drops records.
#[derive(Debug)]
pub struct ScanLog {
    path: Option<PathBuf>,
    header: Header,
    file: Option<File>,
    unlogged: BTreeSet<Stat>,
}

impl ScanLog {
    /// A log that records nothing.
    #[must_use]
    pub fn disabled(registry: &Registry) -> Self {
        Self {
            path: None,
            header: Header::new(registry.stats()),
            file: None,
            unlogged: BTreeSet::new(),
        }
    }

    /// Check whether a log exists at `path`.
    #[must_use]
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    /// Start a fresh log, replacing any existing one with just a header.
    pub fn start(path: &Path, registry: &Registry) -> Result<Self, LogError> {
        let header = Header::new(registry.stats());
        let mut file = File::create(path).map_err(|source| LogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bytes = encode(&[header.labels().iter().map(|s| s.to_string()).collect()])?;
        write_flush(&mut file, &bytes, path)?;
        log::debug!("Started scan log at {}", path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            header,
            file: Some(file),
            unlogged: BTreeSet::new(),
        })
    }

    /// Replay an existing log and reopen it for appending.
    ///
    /// New rows are written with the columns of the existing header. A missing
    /// or empty log behaves like [`ScanLog::start`].
    pub fn resume(path: &Path, registry: &Registry) -> Result<(Self, Recovered), LogError> {
        if !Self::exists(path) {
            return Ok((Self::start(path, registry)?, Recovered::default()));
        }

        let header = Header::new(registry.stats());
        let reader = File::open(path).map_err(|source| LogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(BufReader::new(reader));

        let mut records = csv_reader.records();
        let file_header = match records.next() {
            Some(row) => header.resolve(&row?, registry),
            None => return Ok((Self::start(path, registry)?, Recovered::default())),
        };

        let mut recovered = Recovered::default();
        let mut current: Option<FileRef> = None;
        for (line, row) in records.enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    log::warn!("Scan log line {}: unreadable row: {}", line + 2, e);
                    recovered.malformed += 1;
                    continue;
                }
            };
            if let Err(reason) =
                replay_row(&row, &file_header, registry, &mut current, &mut recovered)
            {
                log::warn!("Scan log line {}: {}", line + 2, reason);
                recovered.malformed += 1;
            }
        }

        log::info!(
            "Recovered {} files and {} cluster entries from {}",
            recovered.visited.len(),
            recovered.entries.len(),
            path.display()
        );

        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| LogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok((
            Self {
                path: Some(path.to_path_buf()),
                header: file_header,
                file: Some(file),
                unlogged: BTreeSet::new(),
            },
            recovered,
        ))
    }

    /// Log path, if enabled.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a processed file and the cluster keys it joined.
    ///
    /// A file keyed on a stat the log has no column for is not written, so a
    /// resumed scan probes it again.
    pub fn append_file(
        &mut self,
        file: &FileEntry,
        keys: &[(Stat, String)],
        registry: &Registry,
    ) -> Result<(), LogError> {
        let Some((handle, path)) = self.file.as_mut().zip(self.path.as_deref()) else {
            return Ok(());
        };
        if let Some((stat, _)) = keys
            .iter()
            .find(|(stat, _)| self.header.position(Column::Stat(*stat)).is_none())
        {
            if self.unlogged.insert(*stat) {
                log::warn!(
                    "Scan log {} has no {} column; files keyed on it are not logged",
                    path.display(),
                    stat.name()
                );
            }
            return Ok(());
        }
        let mut rows = Vec::with_capacity(keys.len() + 1);
        rows.push(self.header.row(|column| match column {
            Column::Group => FILE_ROW.to_string(),
            Column::Path => file.path().to_string_lossy().into_owned(),
            Column::Stat(stat) => file.to_str(stat, registry),
            Column::By | Column::Keep => String::new(),
        }));
        for (stat, key) in keys {
            rows.push(self.header.row(|column| match column {
                Column::Group => KEY_ROW.to_string(),
                Column::By => stat.name().to_string(),
                Column::Stat(s) if s == *stat => key.clone(),
                _ => String::new(),
            }));
        }
        let bytes = encode(&rows)?;
        write_flush(handle, &bytes, path)
    }

    /// Append a skipped extension.
    pub fn append_skip(&mut self, extension: &str) -> Result<(), LogError> {
        let Some((handle, path)) = self.file.as_mut().zip(self.path.as_deref()) else {
            return Ok(());
        };
        let row = self.header.row(|column| match column {
            Column::Group => SKIP_ROW.to_string(),
            Column::By => extension.to_string(),
            _ => String::new(),
        });
        let bytes = encode(&[row])?;
        write_flush(handle, &bytes, path)
    }

    /// Delete the log at `path`. Returns whether a file was removed.
    pub fn discard(path: &Path) -> Result<bool, LogError> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                log::debug!("Deleted scan log {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(LogError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

fn encode(rows: &[Vec<String>]) -> Result<Vec<u8>, LogError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| LogError::Csv(csv::Error::from(e.into_error())))
}

fn write_flush(file: &mut File, bytes: &[u8], path: &Path) -> Result<(), LogError> {
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|source| LogError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn replay_row(
    row: &StringRecord,
    header: &Header,
    registry: &Registry,
    current: &mut Option<FileRef>,
    recovered: &mut Recovered,
) -> Result<(), String> {
    let kind = header
        .cell(Column::Group, row)
        .ok_or_else(|| "row has no kind".to_string())?;

    match kind.trim() {
        FILE_ROW => {
            *current = None;
            let path = header
                .cell(Column::Path, row)
                .ok_or_else(|| "FILE row without a path".to_string())?;
            let (entry, errors) =
                FileEntry::from_strings(Path::new(path), false, header.stat_cells(row), registry);
            for e in errors {
                log::warn!("Scan log value for {}: {}", path, e);
            }
            let entry = Arc::new(entry);
            recovered.visited.insert(entry.path().to_path_buf());
            *current = Some(entry);
            Ok(())
        }
        KEY_ROW => {
            let file = current
                .as_ref()
                .ok_or_else(|| "KEY row without a preceding FILE row".to_string())?;
            let name = header
                .cell(Column::By, row)
                .ok_or_else(|| "KEY row without a stat".to_string())?;
            let stat = registry
                .lookup(name)
                .ok_or_else(|| format!("KEY row for unknown stat '{name}'"))?;
            let text = header
                .cell(Column::Stat(stat), row)
                .ok_or_else(|| format!("KEY row for {stat} without a key"))?;
            let key = registry.str_to_key(stat, text).map_err(|e| e.to_string())?;
            recovered.entries.push(RecoveredKey {
                stat,
                key,
                file: Arc::clone(file),
            });
            Ok(())
        }
        SKIP_ROW => {
            *current = None;
            let ext = header
                .cell(Column::By, row)
                .ok_or_else(|| "SKIP row without an extension".to_string())?;
            recovered.skipped.insert(normalize_extension(ext));
            Ok(())
        }
        other => Err(format!("unknown row kind '{other}'")),
    }
}
