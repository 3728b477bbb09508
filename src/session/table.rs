//! Column model shared by snapshots and scan logs.
//!
//! Every table starts with four fixed columns followed by one column per
//! stat:
//!
//! | Group | Type | Keep | Path | Filename | Size | ... |
//!
//! Header cells are matched case-insensitively against both the fixed column
//! names and every registered stat's identifier or label, so column order is
//! free. A header cell that matches nothing inherits the column at the same
//! position in the fallback header; past the fallback's length, parsing stops.

use csv::StringRecord;

use crate::stats::{Registry, Stat};

/// Marker written in the Keep column for kept files.
pub const KEEP_MARK: &str = "x";

/// Fixed or stat column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Group identifier (snapshots) or row kind (logs)
    Group,
    /// Stat the group was clustered on, or the row's subject
    By,
    /// Keep flag
    Keep,
    /// Canonical path
    Path,
    /// Value of one stat
    Stat(Stat),
}

impl Column {
    const FIXED: [Column; 4] = [Column::Group, Column::By, Column::Keep, Column::Path];

    /// Header text.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Group => "Group",
            Self::By => "Type",
            Self::Keep => "Keep",
            Self::Path => "Path",
            Self::Stat(stat) => stat.label(),
        }
    }

    fn matches(&self, cell: &str) -> bool {
        let cell = cell.trim();
        match self {
            Self::Group => cell.eq_ignore_ascii_case("group"),
            Self::By => cell.eq_ignore_ascii_case("type") || cell.eq_ignore_ascii_case("by"),
            Self::Keep => cell.eq_ignore_ascii_case("keep"),
            Self::Path => cell.eq_ignore_ascii_case("path"),
            Self::Stat(stat) => stat.is(cell),
        }
    }

    /// Resolve a header cell.
    #[must_use]
    pub fn parse(cell: &str, registry: &Registry) -> Option<Self> {
        Self::FIXED
            .into_iter()
            .find(|c| c.matches(cell))
            .or_else(|| registry.lookup(cell).map(Self::Stat))
    }
}

/// Ordered list of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    columns: Vec<Column>,
}

impl Header {
    /// Fixed columns followed by `stats`.
    #[must_use]
    pub fn new(stats: impl IntoIterator<Item = Stat>) -> Self {
        let mut columns = Column::FIXED.to_vec();
        columns.extend(stats.into_iter().map(Column::Stat));
        Self { columns }
    }

    /// Columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Stat columns in order.
    pub fn stats(&self) -> impl Iterator<Item = Stat> + '_ {
        self.columns.iter().filter_map(|c| match c {
            Column::Stat(stat) => Some(*stat),
            _ => None,
        })
    }

    /// Header cells to write.
    #[must_use]
    pub fn labels(&self) -> Vec<&'static str> {
        self.columns.iter().map(Column::label).collect()
    }

    /// Position of a column.
    #[must_use]
    pub fn position(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }

    /// Resolve a header row read from disk, falling back to `self`.
    #[must_use]
    pub fn resolve(&self, raw: &StringRecord, registry: &Registry) -> Header {
        let mut columns = Vec::with_capacity(raw.len());
        for (idx, cell) in raw.iter().enumerate() {
            match Column::parse(cell, registry) {
                Some(column) => columns.push(column),
                None => match self.columns.get(idx) {
                    Some(fallback) => {
                        log::warn!(
                            "Unknown column '{}' at position {}; assuming '{}'",
                            cell,
                            idx + 1,
                            fallback.label()
                        );
                        columns.push(*fallback);
                    }
                    None => {
                        log::warn!(
                            "Unknown column '{}' at position {}; ignoring it and later columns",
                            cell,
                            idx + 1
                        );
                        break;
                    }
                },
            }
        }
        Header { columns }
    }

    /// Cell of `column` in `row`, if present and non-empty.
    #[must_use]
    pub fn cell<'r>(&self, column: Column, row: &'r StringRecord) -> Option<&'r str> {
        self.position(column)
            .and_then(|idx| row.get(idx))
            .filter(|s| !s.trim().is_empty())
    }

    /// Stat cells of `row` paired with their stats.
    pub fn stat_cells<'a>(&'a self, row: &'a StringRecord) -> impl Iterator<Item = (Stat, &'a str)> + 'a {
        self.columns
            .iter()
            .enumerate()
            .filter_map(move |(idx, column)| match column {
                Column::Stat(stat) => row.get(idx).map(|cell| (*stat, cell)),
                _ => None,
            })
    }

    /// Build a row by asking `cell` for each column's text.
    pub fn row(&self, mut cell: impl FnMut(Column) -> String) -> Vec<String> {
        self.columns.iter().map(|c| cell(*c)).collect()
    }
}
