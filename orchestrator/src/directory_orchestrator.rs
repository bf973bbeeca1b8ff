//! Directory pipeline orchestration
//!
//! Drives each registered directory through scan → process → chunk → store,
//! updating its status after every stage and every file. The directory table
//! is owned here; callers only ever see clones of its entries.

use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use shared::{process_debug, process_error, process_info, process_warn, ProcessId};

use crate::config::OrchestratorConfig;
use crate::core::{DirectoryProcessingStatus, OrchestrationResult, ProcessingStage};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{Chunker, ChunkStore, DirectoryScanner, FileProcessor, LockManager};
use crate::types::{ChunkingResult, FileStatus};

/// Progress reached at the start of each stage
const PROGRESS_SCANNING: f64 = 0.0;
const PROGRESS_PROCESSING: f64 = 10.0;
const PROGRESS_PROCESSING_SPAN: f64 = 60.0;
const PROGRESS_CHUNKING: f64 = 80.0;
const PROGRESS_STORING: f64 = 90.0;

/// A registered run of one directory
struct ActiveRun {
    run_id: Uuid,
    status: DirectoryProcessingStatus,
}

#[derive(Default)]
struct DirectoryTables {
    active: HashMap<PathBuf, ActiveRun>,
    /// Last terminal status per directory
    history: HashMap<PathBuf, DirectoryProcessingStatus>,
    /// Explicit retries used since the last successful run
    retries: HashMap<PathBuf, u32>,
    /// Failed runs whose lock was kept because cleanup-on-failure is off
    retained_locks: HashSet<PathBuf>,
}

/// Why a pipeline stopped before completing
enum RunError {
    /// The run's entry was removed by a cancellation
    Cancelled,
    Failed(OrchestratorError),
}

impl From<OrchestratorError> for RunError {
    fn from(error: OrchestratorError) -> Self {
        RunError::Failed(error)
    }
}

enum Completion {
    Completed,
    Failed(String),
}

/// Coordinates directory pipelines with injected collaborators
pub struct DirectoryOrchestrator<S, F, C, T>
where
    S: DirectoryScanner,
    F: FileProcessor,
    C: Chunker,
    T: ChunkStore,
{
    config: OrchestratorConfig,
    scanner: S,
    processor: F,
    chunker: C,
    store: T,
    locks: Arc<dyn LockManager>,
    tables: Mutex<DirectoryTables>,
    /// Shared by every path that starts a pipeline
    permits: Semaphore,
}

impl<S, F, C, T> DirectoryOrchestrator<S, F, C, T>
where
    S: DirectoryScanner,
    F: FileProcessor,
    C: Chunker,
    T: ChunkStore,
{
    /// Create an orchestrator, failing fast on an invalid configuration
    pub fn new(
        config: OrchestratorConfig,
        scanner: S,
        processor: F,
        chunker: C,
        store: T,
        locks: Arc<dyn LockManager>,
    ) -> OrchestratorResult<Self> {
        config.validate()?;
        let permits = Semaphore::new(config.max_concurrent_directories);
        Ok(Self {
            config,
            scanner,
            processor,
            chunker,
            store,
            locks,
            tables: Mutex::new(DirectoryTables::default()),
            permits,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run the full pipeline for one directory
    ///
    /// Never returns with the directory in a non-terminal state; every error
    /// is folded into a `success = false` result.
    pub async fn process_directory(&self, path: impl AsRef<Path>) -> OrchestrationResult {
        let directory = normalize_path(path.as_ref());

        if !is_directory(&directory).await {
            let error = OrchestratorError::DirectoryNotFound { path: directory.clone() };
            process_warn!(ProcessId::current(), "⚠️ {}", error);
            return OrchestrationResult::rejected(&directory, error);
        }

        let (run_id, initial) = match self.register(&directory).await {
            Ok(registered) => registered,
            Err(error) => {
                process_warn!(ProcessId::current(), "⚠️ Rejected {}: {}", directory.display(), error);
                return OrchestrationResult::rejected(&directory, error);
            }
        };
        let mut updates = vec![initial];

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                let message = format!("Concurrency limiter unavailable: {e}");
                return self.conclude(&directory, run_id, Err(RunError::Failed(OrchestratorError::process(message))), updates).await;
            }
        };

        let timeout = self.config.processing_timeout();
        let outcome = match tokio::time::timeout(timeout, self.run_pipeline(&directory, run_id, &mut updates)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RunError::Failed(OrchestratorError::Timeout { timeout })),
        };

        self.conclude(&directory, run_id, outcome, updates).await
    }

    /// Process several directories, returning results in input order
    pub async fn process_multiple_directories<P>(&self, paths: &[P]) -> OrchestratorResult<Vec<OrchestrationResult>>
    where
        P: AsRef<Path> + Sync,
    {
        if paths.is_empty() {
            return Err(OrchestratorError::InvalidInput {
                message: "At least one directory path is required".to_string(),
            });
        }

        process_info!(
            ProcessId::current(),
            "📂 Processing {} directories (parallel: {}, limit: {})",
            paths.len(),
            self.config.enable_parallel_processing,
            self.config.max_concurrent_directories
        );

        if self.config.enable_parallel_processing {
            // join_all keeps input order; the semaphore bounds concurrency
            Ok(join_all(paths.iter().map(|p| self.process_directory(p))).await)
        } else {
            let mut results = Vec::with_capacity(paths.len());
            for path in paths {
                results.push(self.process_directory(path).await);
            }
            Ok(results)
        }
    }

    /// Live status of an active directory
    pub async fn get_processing_status(&self, path: impl AsRef<Path>) -> Option<DirectoryProcessingStatus> {
        let directory = normalize_path(path.as_ref());
        let mut tables = self.tables.lock().await;
        tables.active.get_mut(&directory).map(|run| {
            run.status.touch();
            run.status.clone()
        })
    }

    /// Snapshot of every active directory
    pub async fn get_all_processing_status(&self) -> HashMap<PathBuf, DirectoryProcessingStatus> {
        let mut tables = self.tables.lock().await;
        tables
            .active
            .iter_mut()
            .map(|(path, run)| {
                run.status.touch();
                (path.clone(), run.status.clone())
            })
            .collect()
    }

    /// Last terminal status recorded for a directory
    pub async fn get_last_status(&self, path: impl AsRef<Path>) -> Option<DirectoryProcessingStatus> {
        let directory = normalize_path(path.as_ref());
        self.tables.lock().await.history.get(&directory).cloned()
    }

    pub async fn active_count(&self) -> usize {
        self.tables.lock().await.active.len()
    }

    /// Cancel an active directory
    ///
    /// The running stage is allowed to finish its current file or chunk
    /// call; no later stage starts. Returns false if nothing was active or
    /// the lock could not be released.
    pub async fn cancel_processing(&self, path: impl AsRef<Path>) -> bool {
        let directory = normalize_path(path.as_ref());
        let mut tables = self.tables.lock().await;

        let Some(mut run) = tables.active.remove(&directory) else {
            return false;
        };
        run.status.transition(ProcessingStage::Cancelled);
        tables.history.insert(directory.clone(), run.status);

        let released = self.cleanup_resources(&directory).await;
        process_info!(ProcessId::current(), "🛑 Cancelled processing of {}", directory.display());
        released
    }

    /// Cancel every active directory; true only if every cancellation succeeded
    pub async fn stop_all_processing(&self) -> bool {
        let active: Vec<PathBuf> = self.tables.lock().await.active.keys().cloned().collect();
        let mut all_cancelled = true;
        for directory in &active {
            if !self.cancel_processing(directory).await {
                process_warn!(ProcessId::current(), "⚠️ Failed to cancel {}", directory.display());
                all_cancelled = false;
            }
        }
        process_debug!(ProcessId::current(), "🛑 Stopped {} active directories", active.len());
        all_cancelled
    }

    /// Start a fresh run for a directory whose last run ended
    ///
    /// Retries always restart from the scan. Each directory gets
    /// `retry_attempts` explicit retries between successful runs.
    pub async fn retry_failed_processing(&self, path: impl AsRef<Path>) -> OrchestrationResult {
        let directory = normalize_path(path.as_ref());

        let attempt = {
            let mut tables = self.tables.lock().await;
            if tables.active.contains_key(&directory) {
                return OrchestrationResult::rejected(
                    &directory,
                    OrchestratorError::CurrentlyProcessing { path: directory.clone() },
                );
            }

            let used = tables.retries.get(&directory).copied().unwrap_or(0);
            if used >= self.config.retry_attempts {
                return OrchestrationResult::rejected(
                    &directory,
                    OrchestratorError::RetryLimitReached {
                        path: directory.clone(),
                        attempts: used,
                    },
                );
            }
            tables.retries.insert(directory.clone(), used + 1);

            if tables.retained_locks.remove(&directory) {
                self.cleanup_resources(&directory).await;
            }
            used + 1
        };

        process_info!(
            ProcessId::current(),
            "🔁 Retrying {} (attempt {}/{})",
            directory.display(),
            attempt,
            self.config.retry_attempts
        );

        let mut result = self.process_directory(&directory).await;
        result.metadata.insert("retry_attempt".into(), attempt.into());
        result
    }

    /// Forget a finished directory and release anything its run kept
    ///
    /// Refuses (returns false) while the directory is active.
    pub async fn cleanup_processed_directory(&self, path: impl AsRef<Path>) -> bool {
        let directory = normalize_path(path.as_ref());
        let mut tables = self.tables.lock().await;

        if tables.active.contains_key(&directory) {
            process_warn!(
                ProcessId::current(),
                "⚠️ Not cleaning up {}: still being processed",
                directory.display()
            );
            return false;
        }

        let had_record = tables.history.remove(&directory).is_some();
        tables.retries.remove(&directory);
        if tables.retained_locks.remove(&directory) {
            self.cleanup_resources(&directory).await;
        }
        had_record
    }

    /// Release the directory lock; the only resource a run holds
    async fn cleanup_resources(&self, directory: &Path) -> bool {
        match self.locks.release_lock(directory).await {
            Ok(()) => true,
            Err(e) => {
                process_error!(
                    ProcessId::current(),
                    "❌ Failed to release lock for {}: {}",
                    directory.display(),
                    e
                );
                false
            }
        }
    }

    /// Claim the table slot and the directory lock
    async fn register(&self, directory: &Path) -> OrchestratorResult<(Uuid, DirectoryProcessingStatus)> {
        let mut tables = self.tables.lock().await;
        if tables.active.contains_key(directory) {
            return Err(OrchestratorError::AlreadyProcessing {
                path: directory.to_path_buf(),
            });
        }

        // A lock kept from an earlier failed run belongs to that run
        if tables.retained_locks.remove(directory) {
            self.cleanup_resources(directory).await;
        }
        self.locks.acquire_lock(directory).await?;

        let run_id = Uuid::new_v4();
        let status = DirectoryProcessingStatus::new(directory);
        tables.active.insert(
            directory.to_path_buf(),
            ActiveRun {
                run_id,
                status: status.clone(),
            },
        );
        process_debug!(ProcessId::current(), "📥 Registered {} (run {})", directory.display(), run_id);
        Ok((run_id, status))
    }

    /// Apply `update` to this run's entry, or report that it was cancelled
    async fn update_status<U>(&self, directory: &Path, run_id: Uuid, update: U) -> Result<DirectoryProcessingStatus, RunError>
    where
        U: FnOnce(&mut DirectoryProcessingStatus),
    {
        let mut tables = self.tables.lock().await;
        match tables.active.get_mut(directory) {
            Some(run) if run.run_id == run_id => {
                update(&mut run.status);
                Ok(run.status.clone())
            }
            _ => Err(RunError::Cancelled),
        }
    }

    /// Enter the next stage and capture the snapshot
    async fn advance(
        &self,
        directory: &Path,
        run_id: Uuid,
        stage: ProcessingStage,
        progress: f64,
        updates: &mut Vec<DirectoryProcessingStatus>,
    ) -> Result<(), RunError> {
        let track = self.config.enable_progress_tracking;
        let snapshot = self
            .update_status(directory, run_id, |status| {
                status.transition(stage);
                if track {
                    status.set_progress(progress);
                }
            })
            .await?;
        process_debug!(ProcessId::current(), "➡️ {} entered {}", directory.display(), stage);
        updates.push(snapshot);
        Ok(())
    }

    async fn run_pipeline(
        &self,
        directory: &Path,
        run_id: Uuid,
        updates: &mut Vec<DirectoryProcessingStatus>,
    ) -> Result<(), RunError> {
        let track = self.config.enable_progress_tracking;
        let recover = self.config.enable_error_recovery;

        // Scan
        self.advance(directory, run_id, ProcessingStage::Scanning, PROGRESS_SCANNING, updates)
            .await?;
        let files = self.scanner.scan(directory).await?;
        let files_found = files.len() as u64;
        self.update_status(directory, run_id, |status| status.set_files_found(files_found))
            .await?;
        process_info!(
            ProcessId::current(),
            "🔍 Found {} files in {}",
            files_found,
            directory.display()
        );
        if files.is_empty() {
            return Ok(());
        }

        // Process
        self.advance(directory, run_id, ProcessingStage::Processing, PROGRESS_PROCESSING, updates)
            .await?;
        let mut outputs = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let failure = match self.processor.process_file(&file.path).await {
                Ok(result) if result.is_failed() => {
                    Some(result.error.unwrap_or_else(|| "processing failed".to_string()))
                }
                Ok(result) => {
                    outputs.push(result);
                    None
                }
                Err(e) => Some(e.to_string()),
            };

            let progress = PROGRESS_PROCESSING + PROGRESS_PROCESSING_SPAN * (index + 1) as f64 / files.len() as f64;
            let failed = failure.is_some();
            self.update_status(directory, run_id, |status| {
                if failed {
                    status.record_file_failed();
                } else {
                    status.record_file_processed();
                }
                if track {
                    status.set_progress(progress);
                }
            })
            .await?;

            if let Some(reason) = failure {
                let message = format!("{}: {}", file.path.display(), reason);
                if !recover {
                    return Err(OrchestratorError::stage("processing", message).into());
                }
                process_warn!(ProcessId::current(), "⚠️ Skipping failed file {}", message);
            }
        }

        // Chunk
        self.advance(directory, run_id, ProcessingStage::Chunking, PROGRESS_CHUNKING, updates)
            .await?;
        let mut chunking = ChunkingResult::default();
        for output in outputs.iter().filter(|o| o.status == FileStatus::Success) {
            match self.chunker.create_chunks(output).await {
                Ok(result) => chunking.merge(result),
                Err(e) if recover => {
                    chunking.failed += 1;
                    chunking.errors.push(format!("{}: {}", output.file_path.display(), e));
                }
                Err(e) => return Err(OrchestratorError::stage("chunking", e.to_string()).into()),
            }
        }
        if !chunking.errors.is_empty() {
            process_warn!(
                ProcessId::current(),
                "⚠️ {} chunking errors in {}",
                chunking.errors.len(),
                directory.display()
            );
        }

        // Store
        self.advance(directory, run_id, ProcessingStage::Storing, PROGRESS_STORING, updates)
            .await?;
        if !self.store.store_results(&chunking, directory).await? {
            return Err(OrchestratorError::stage(
                "storing",
                format!("chunk store rejected {} chunks", chunking.created),
            )
            .into());
        }
        let chunks_created = chunking.created;
        self.update_status(directory, run_id, |status| {
            status.chunks_created = chunks_created;
            status.touch();
        })
        .await?;

        Ok(())
    }

    /// Single exit of a run: apply the terminal transition and build the result
    async fn conclude(
        &self,
        directory: &Path,
        run_id: Uuid,
        outcome: Result<(), RunError>,
        updates: Vec<DirectoryProcessingStatus>,
    ) -> OrchestrationResult {
        let completion = match outcome {
            Ok(()) => Some(Completion::Completed),
            Err(RunError::Failed(error)) => Some(Completion::Failed(error.to_string())),
            Err(RunError::Cancelled) => None,
        };

        let final_status = match completion {
            Some(completion) => self.finish_run(directory, run_id, completion).await,
            None => None,
        };

        match final_status {
            Some(status) => {
                if status.status == ProcessingStage::Completed {
                    process_info!(
                        ProcessId::current(),
                        "✅ Completed {}: {} processed, {} failed, {} chunks in {:.2}s",
                        directory.display(),
                        status.files_processed,
                        status.files_failed,
                        status.chunks_created,
                        status.processing_time.unwrap_or_default()
                    );
                } else {
                    process_error!(
                        ProcessId::current(),
                        "❌ Processing of {} failed: {}",
                        directory.display(),
                        status.error_message.as_deref().unwrap_or("unknown error")
                    );
                }
                OrchestrationResult::from_final_status(&status, updates)
            }
            None => {
                // Entry was already removed by cancel_processing
                let mut cancelled = updates
                    .last()
                    .cloned()
                    .unwrap_or_else(|| DirectoryProcessingStatus::new(directory));
                cancelled.transition(ProcessingStage::Cancelled);
                cancelled.error_message = Some("Processing cancelled".to_string());
                OrchestrationResult::from_final_status(&cancelled, updates)
            }
        }
    }

    /// Remove this run from the table in its terminal state
    ///
    /// Returns `None` when the entry is gone, i.e. the run was cancelled.
    async fn finish_run(&self, directory: &Path, run_id: Uuid, completion: Completion) -> Option<DirectoryProcessingStatus> {
        let mut tables = self.tables.lock().await;
        let owned = tables
            .active
            .get(directory)
            .is_some_and(|run| run.run_id == run_id);
        if !owned {
            return None;
        }
        let mut status = tables.active.remove(directory)?.status;

        let release = match completion {
            Completion::Completed => {
                status.transition(ProcessingStage::Completed);
                status.set_progress(100.0);
                tables.retries.remove(directory);
                true
            }
            Completion::Failed(message) => {
                status.fail(message);
                self.config.enable_cleanup_on_failure
            }
        };

        tables.history.insert(directory.to_path_buf(), status.clone());
        if release {
            self.cleanup_resources(directory).await;
        } else {
            tables.retained_locks.insert(directory.to_path_buf());
        }
        Some(status)
    }
}

/// Lexically normalize a path so `a/b/`, `a/./b` and `a/b` share a key
fn normalize_path(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        normalized
    }
}

async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
