//! Process exit codes and machine-readable error reports.

use serde::Serialize;

use crate::duplicates::FinderError;

/// Exit status of a command.
///
/// - 0: success
/// - 1: error
/// - 2: completed, but no duplicate groups exist
/// - 3: completed with per-file errors
/// - 130: interrupted (128 + SIGINT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed with groups to review.
    Success = 0,
    /// Failed.
    GeneralError = 1,
    /// Completed without any group.
    NoDuplicates = 2,
    /// Completed, but some files could not be read.
    PartialSuccess = 3,
    /// Stopped by Ctrl+C; the scan log is resumable.
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DS000",
            Self::GeneralError => "DS001",
            Self::NoDuplicates => "DS002",
            Self::PartialSuccess => "DS003",
            Self::Interrupted => "DS130",
        }
    }

    /// Classify a failure; interruptions anywhere in the chain map to 130.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        let interrupted = err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<FinderError>(),
                Some(FinderError::Interrupted)
            )
        });
        if interrupted {
            Self::Interrupted
        } else {
            Self::GeneralError
        }
    }
}

/// Error report printed with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// Prefix such as "DS001"
    pub code: String,
    /// Process exit code
    pub exit_code: i32,
    /// Error message including causes
    pub message: String,
    /// True when the run was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Build a report for `err`.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
