//! Persistence of scan state and results.
//!
//! # Features
//!
//! * **Snapshots**: groups and keep flags in a human-editable CSV table that
//!   can be reviewed, edited and loaded back.
//! * **Scan log**: an append-only record of processed files that lets an
//!   interrupted scan resume without re-reading finished files.
//!
//! # Architecture
//!
//! * [`table`]: column model and header resolution shared by both formats
//! * [`log`]: the scan log
//! * [`snapshot`]: the persisted group table

pub mod log;
pub mod snapshot;
pub mod table;

pub use self::log::{LogError, Recovered, RecoveredKey, ScanLog};
pub use snapshot::{Snapshot, SnapshotError};
pub use table::{Column, Header};
