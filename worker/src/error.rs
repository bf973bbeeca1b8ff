//! Worker error types

use orchestrator::OrchestratorError;
use shared::{SharedError, WorkerExitCode};
use thiserror::Error;

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Worker error types
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Chunk store rejected batch {batch}")]
    StoreRejected { batch: usize },

    #[error("Interrupted after {files_handled} files")]
    Interrupted { files_handled: u64 },

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("Report error: {0}")]
    Report(#[from] SharedError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl WorkerError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> WorkerExitCode {
        match self {
            Self::InvalidArguments { .. } => WorkerExitCode::InvalidArguments,
            _ => WorkerExitCode::ProcessingFailed,
        }
    }
}
