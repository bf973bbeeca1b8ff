//! Worker → manager report lines
//!
//! A worker writes one JSON object per line to its stdout. The process
//! manager reads these lines to keep `files_processed` current.

use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};

/// Progress report emitted by a worker process
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerReport {
    Started {
        directory: String,
        files_found: u64,
    },
    Progress {
        files_processed: u64,
        files_failed: u64,
        chunks_created: u64,
    },
    Completed {
        files_processed: u64,
        files_failed: u64,
        chunks_created: u64,
        processing_time: f64,
    },
    Failed {
        error: String,
    },
}

impl WorkerReport {
    /// Serialize as a single line (no trailing newline)
    pub fn to_line(&self) -> SharedResult<String> {
        serde_json::to_string(self).map_err(|e| SharedError::ReportEncoding { message: e.to_string() })
    }

    /// Parse one stdout line
    pub fn from_line(line: &str) -> SharedResult<Self> {
        let line = line.trim();
        serde_json::from_str(line).map_err(|e| SharedError::MalformedReport {
            line: line.to_string(),
            message: e.to_string(),
        })
    }

    /// Files handled so far, when the report carries a count
    pub fn files_processed(&self) -> Option<u64> {
        match self {
            WorkerReport::Progress { files_processed, .. } | WorkerReport::Completed { files_processed, .. } => {
                Some(*files_processed)
            }
            _ => None,
        }
    }
}

/// Process exit codes used by the worker binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExitCode {
    Success = 0,
    ProcessingFailed = 1,
    InvalidArguments = 2,
}

impl WorkerExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::ProcessingFailed),
            2 => Some(Self::InvalidArguments),
            _ => None,
        }
    }
}
