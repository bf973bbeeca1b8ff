//! Orchestrator-specific error types

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use shared::SharedError;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Directory not found: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("Directory {} is already being processed", path.display())]
    AlreadyProcessing { path: PathBuf },

    #[error("Directory {} is currently being processed", path.display())]
    CurrentlyProcessing { path: PathBuf },

    #[error("Directory {} is locked by another owner", path.display())]
    DirectoryLocked { path: PathBuf },

    #[error("Worker process {pid} not found")]
    WorkerNotFound { pid: u32 },

    #[error("Maximum workers limit reached ({max_workers})")]
    WorkerLimitReached { max_workers: usize },

    #[error("Retry limit reached for {} after {attempts} attempts", path.display())]
    RetryLimitReached { path: PathBuf, attempts: u32 },

    #[error("Failed to scan directory {}: {message}", path.display())]
    ScanFailed { path: PathBuf, message: String },

    #[error("{stage} stage failed: {message}")]
    StageFailed { stage: String, message: String },

    #[error("Processing timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Process management failed: {message}")]
    ProcessError { message: String },

    #[error("Lock operation failed on {}: {message}", path.display())]
    LockError { path: PathBuf, message: String },

    #[error("Configuration error: {field}: {message}")]
    ConfigurationError { field: String, message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Coarse classification used by callers deciding whether to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    ResourceLimit,
    StageFailure,
    ProcessManagement,
    Configuration,
}

impl OrchestratorError {
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::ProcessError { message: message.into() }
    }

    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn scan(path: &Path, message: impl Into<String>) -> Self {
        Self::ScanFailed {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn lock(path: &Path, message: impl Into<String>) -> Self {
        Self::LockError {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DirectoryNotFound { .. } | Self::WorkerNotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyProcessing { .. } | Self::CurrentlyProcessing { .. } | Self::DirectoryLocked { .. } => {
                ErrorKind::Conflict
            }
            Self::WorkerLimitReached { .. } | Self::RetryLimitReached { .. } => ErrorKind::ResourceLimit,
            Self::ProcessError { .. } => ErrorKind::ProcessManagement,
            Self::ConfigurationError { .. } | Self::InvalidInput { .. } => ErrorKind::Configuration,
            Self::ScanFailed { .. }
            | Self::StageFailed { .. }
            | Self::Timeout { .. }
            | Self::LockError { .. }
            | Self::SharedError(_)
            | Self::IoError(_)
            | Self::JsonError(_) => ErrorKind::StageFailure,
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
