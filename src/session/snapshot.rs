//! Persisted group snapshot.
//!
//! A snapshot is a CSV table with one row per (group, member):
//!
//! | Group | Type | Keep | Path | stat columns... |
//!
//! Group ids are positional (`0..n`) when written. On load, rows are grouped
//! by their Group cell, groups are ordered by id (numerically when every id
//! is a number), and rows for the same path share one file entity.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::table::{Column, Header, KEEP_MARK};
use crate::duplicates::FileGroup;
use crate::scanner::{path_utils, FileEntry, FileRef};
use crate::stats::Registry;

/// Errors raised while saving or loading a snapshot.
#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    /// The target exists and overwriting was not allowed.
    #[error("Snapshot {0} already exists")]
    AlreadyExists(PathBuf),

    /// Opening or writing the file failed.
    #[error("Snapshot I/O error for {path}: {source}")]
    Io {
        /// Snapshot path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Encoding or decoding a row failed.
    #[error("Snapshot CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The snapshot has no header row.
    #[error("Snapshot has no header row")]
    MissingHeader,
}

/// Reader/writer for snapshot tables with a fixed default header.
#[derive(Debug, Clone)]
pub struct Snapshot {
    header: Header,
}

impl Snapshot {
    /// Use `header` for writing and as the fallback when reading.
    #[must_use]
    pub fn new(header: Header) -> Self {
        Self { header }
    }

    /// Default header: every non-hidden registered stat.
    #[must_use]
    pub fn for_registry(registry: &Registry) -> Self {
        Self::new(Header::new(registry.header_stats()))
    }

    /// Header used for writing.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Write `groups` to `path`.
    ///
    /// Fails with [`SnapshotError::AlreadyExists`] when the file exists and
    /// `overwrite` is false; nothing is written in that case.
    pub fn save(
        &self,
        path: &Path,
        groups: &[FileGroup],
        registry: &Registry,
        overwrite: bool,
    ) -> Result<(), SnapshotError> {
        if path.exists() && !overwrite {
            return Err(SnapshotError::AlreadyExists(path.to_path_buf()));
        }
        let io_err = |source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer, groups, registry)?;
        writer.flush().map_err(io_err)?;
        log::info!("Saved {} groups to {}", groups.len(), path.display());
        Ok(())
    }

    /// Write `groups` as CSV to any writer.
    pub fn write_to<W: Write>(
        &self,
        writer: W,
        groups: &[FileGroup],
        registry: &Registry,
    ) -> Result<(), SnapshotError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv_writer.write_record(self.header.labels())?;
        for (id, group) in groups.iter().enumerate() {
            for file in &group.files {
                csv_writer.write_record(self.header.row(|column| match column {
                    Column::Group => id.to_string(),
                    Column::By => group.stat.name().to_string(),
                    Column::Keep => {
                        if file.keep() {
                            KEEP_MARK.to_string()
                        } else {
                            String::new()
                        }
                    }
                    Column::Path => file.path().to_string_lossy().into_owned(),
                    Column::Stat(stat) => file.to_str(stat, registry),
                }))?;
            }
        }
        csv_writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Load groups from `path`.
    pub fn load(&self, path: &Path, registry: &Registry) -> Result<Vec<FileGroup>, SnapshotError> {
        let file = File::open(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let groups = self.read_from(BufReader::new(file), registry)?;
        log::info!("Loaded {} groups from {}", groups.len(), path.display());
        Ok(groups)
    }

    /// Read groups from any reader.
    pub fn read_from<R: Read>(&self, reader: R, registry: &Registry) -> Result<Vec<FileGroup>, SnapshotError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut records = csv_reader.records();
        let header = match records.next() {
            Some(row) => self.header.resolve(&row?, registry),
            None => return Err(SnapshotError::MissingHeader),
        };

        let mut ids: Vec<String> = Vec::new();
        let mut by_id: HashMap<String, FileGroup> = HashMap::new();
        let mut files: HashMap<PathBuf, FileRef> = HashMap::new();

        for (line, row) in records.enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    log::warn!("Snapshot line {}: unreadable row: {}", line + 2, e);
                    continue;
                }
            };
            let (Some(id), Some(path)) = (
                header.cell(Column::Group, &row),
                header.cell(Column::Path, &row),
            ) else {
                log::warn!("Snapshot line {}: missing group or path", line + 2);
                continue;
            };

            if !by_id.contains_key(id) {
                let Some(stat) = header.cell(Column::By, &row).and_then(|s| registry.lookup(s))
                else {
                    log::warn!("Snapshot line {}: unknown group type", line + 2);
                    continue;
                };
                ids.push(id.to_string());
                by_id.insert(id.to_string(), FileGroup::new(stat));
            }

            let keep = header
                .cell(Column::Keep, &row)
                .is_some_and(|k| !k.trim().is_empty());
            let canonical = path_utils::canonical(Path::new(path));
            let file = match files.get(&canonical) {
                Some(existing) => {
                    if keep {
                        existing.set_keep(true);
                    }
                    Arc::clone(existing)
                }
                None => {
                    let (entry, errors) = FileEntry::from_strings(
                        Path::new(path),
                        keep,
                        header.stat_cells(&row),
                        registry,
                    );
                    for e in errors {
                        log::warn!("Snapshot line {}: {}", line + 2, e);
                    }
                    let entry = Arc::new(entry);
                    files.insert(canonical, Arc::clone(&entry));
                    entry
                }
            };
            if let Some(group) = by_id.get_mut(id) {
                group.add(file);
            }
        }

        sort_ids(&mut ids);
        Ok(ids
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect())
    }
}

fn sort_ids(ids: &mut [String]) {
    let numeric: Option<Vec<u64>> = ids.iter().map(|id| id.trim().parse().ok()).collect();
    if numeric.is_some() {
        ids.sort_by_key(|id| id.trim().parse::<u64>().unwrap_or(u64::MAX));
    } else {
        ids.sort();
    }
}
