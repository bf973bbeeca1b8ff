//! Trait definitions with mockall annotations for testing
//!
//! These are the collaborator seams of the orchestrator and the process
//! manager. Real implementations live in `services`; tests inject the
//! generated mocks or hand-written fakes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::OrchestratorResult;
use crate::types::{ChunkingResult, FileInfo, FileProcessingResult};

/// Everything a process controller needs to launch one worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerLaunch {
    pub directory_path: PathBuf,
    pub chunk_size: usize,
    pub restart_count: u32,
}

/// Directory scan abstraction
#[mockall::automock]
#[async_trait::async_trait]
pub trait DirectoryScanner: Send + Sync {
    /// List the files of a directory that should be ingested
    ///
    /// # Returns
    /// The discovered files, or a scan error on I/O failure
    async fn scan(&self, directory: &Path) -> OrchestratorResult<Vec<FileInfo>>;
}

/// Content extraction abstraction
#[mockall::automock]
#[async_trait::async_trait]
pub trait FileProcessor: Send + Sync {
    /// Extract content blocks from a single file
    ///
    /// An `Err` and a result with `FileStatus::Failed` are both counted as a
    /// failed file by the orchestrator.
    async fn process_file(&self, path: &Path) -> OrchestratorResult<FileProcessingResult>;
}

/// Chunk creation abstraction
#[mockall::automock]
#[async_trait::async_trait]
pub trait Chunker: Send + Sync {
    async fn create_chunks(&self, result: &FileProcessingResult) -> OrchestratorResult<ChunkingResult>;
}

/// Chunk persistence abstraction
#[mockall::automock]
#[async_trait::async_trait]
pub trait ChunkStore: Send + Sync {
    /// Persist chunks created for `directory`
    ///
    /// # Returns
    /// `Ok(false)` when the store rejected the batch
    async fn store_results(&self, result: &ChunkingResult, directory: &Path) -> OrchestratorResult<bool>;
}

/// Directory-scoped lock shared by the orchestrator and the process manager
#[mockall::automock]
#[async_trait::async_trait]
pub trait LockManager: Send + Sync {
    /// Take the lock; fails with `DirectoryLocked` when already held
    async fn acquire_lock(&self, directory: &Path) -> OrchestratorResult<()>;

    /// Release the lock; releasing an unheld lock is not an error
    async fn release_lock(&self, directory: &Path) -> OrchestratorResult<()>;

    async fn is_locked(&self, directory: &Path) -> bool;
}

/// OS process control used by the worker process manager
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessControl: Send + Sync {
    /// Launch a worker and return its OS pid
    async fn spawn(&self, launch: &WorkerLaunch) -> OrchestratorResult<u32>;

    async fn is_running(&self, pid: u32) -> bool;

    /// Exit code of a finished process, `None` while running, killed by a
    /// signal, or unknown
    async fn exit_code(&self, pid: u32) -> Option<i32>;

    /// Ask the process to exit (SIGTERM on unix)
    async fn terminate(&self, pid: u32) -> OrchestratorResult<()>;

    /// Force the process to exit
    async fn kill(&self, pid: u32) -> OrchestratorResult<()>;

    /// Wait for exit, returning whether the process exited within `timeout`
    async fn wait(&self, pid: u32, timeout: Duration) -> OrchestratorResult<bool>;

    /// Latest file count reported by the worker
    async fn files_processed(&self, pid: u32) -> Option<u64>;

    /// Drop any bookkeeping kept for a pid that is no longer managed
    async fn forget(&self, pid: u32);
}
