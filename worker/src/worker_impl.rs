//! Worker implementation with dependency injection

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use orchestrator::{Chunker, ChunkStore, ChunkingResult, DirectoryScanner, FileProcessor, FileStatus};
use shared::{logging, process_debug, process_info, process_warn, ProcessId, WorkerReport};

use crate::error::{WorkerError, WorkerResult};

/// What a worker was asked to do
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub directory: PathBuf,
    /// Files per batch; one progress report is written per batch
    pub chunk_size: usize,
}

impl WorkerConfig {
    pub fn validate(&self) -> WorkerResult<()> {
        if self.chunk_size == 0 {
            return Err(WorkerError::InvalidArguments {
                message: "chunk size must be greater than 0".to_string(),
            });
        }
        if !self.directory.is_dir() {
            return Err(WorkerError::InvalidArguments {
                message: format!("{} is not a directory", self.directory.display()),
            });
        }
        Ok(())
    }
}

/// Totals of a finished run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerSummary {
    pub files_found: u64,
    pub files_processed: u64,
    pub files_failed: u64,
    pub chunks_created: u64,
    pub processing_time: f64,
}

/// Single-directory ingestion worker
pub struct Worker<S, F, C, T>
where
    S: DirectoryScanner,
    F: FileProcessor,
    C: Chunker,
    T: ChunkStore,
{
    config: WorkerConfig,
    scanner: S,
    processor: F,
    chunker: C,
    store: T,
    should_stop: Arc<AtomicBool>,
}

impl<S, F, C, T> Worker<S, F, C, T>
where
    S: DirectoryScanner,
    F: FileProcessor,
    C: Chunker,
    T: ChunkStore,
{
    /// Create new worker instance
    pub fn new(config: WorkerConfig, scanner: S, processor: F, chunker: C, store: T) -> WorkerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scanner,
            processor,
            chunker,
            store,
            should_stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag checked between batches; set it to stop after the current batch
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.should_stop)
    }

    /// Ingest the directory, writing one report line per event to `out`
    ///
    /// A failed run still ends with a `Failed` report line.
    pub async fn run<W: Write>(&self, out: &mut W) -> WorkerResult<WorkerSummary> {
        let started = Instant::now();
        match self.ingest(out).await {
            Ok(mut summary) => {
                summary.processing_time = started.elapsed().as_secs_f64();
                emit(
                    out,
                    &WorkerReport::Completed {
                        files_processed: summary.files_processed,
                        files_failed: summary.files_failed,
                        chunks_created: summary.chunks_created,
                        processing_time: summary.processing_time,
                    },
                )?;
                logging::log_success(
                    ProcessId::current(),
                    &format!(
                        "Ingested {} ({} files, {} chunks)",
                        self.config.directory.display(),
                        summary.files_processed,
                        summary.chunks_created
                    ),
                );
                Ok(summary)
            }
            Err(e) => {
                let _ = emit(out, &WorkerReport::Failed { error: e.to_string() });
                Err(e)
            }
        }
    }

    async fn ingest<W: Write>(&self, out: &mut W) -> WorkerResult<WorkerSummary> {
        let directory = &self.config.directory;
        let files = self.scanner.scan(directory).await?;

        let mut summary = WorkerSummary {
            files_found: files.len() as u64,
            ..WorkerSummary::default()
        };
        emit(
            out,
            &WorkerReport::Started {
                directory: directory.display().to_string(),
                files_found: summary.files_found,
            },
        )?;
        process_info!(
            ProcessId::current(),
            "🔍 Found {} files in {}",
            summary.files_found,
            directory.display()
        );

        for (batch_index, batch) in files.chunks(self.config.chunk_size).enumerate() {
            if self.should_stop.load(Ordering::Relaxed) {
                return Err(WorkerError::Interrupted {
                    files_handled: summary.files_processed + summary.files_failed,
                });
            }

            let mut chunking = ChunkingResult::default();
            for file in batch {
                let result = match self.processor.process_file(&file.path).await {
                    Ok(result) if result.is_failed() => {
                        let reason = result.error.unwrap_or_default();
                        process_warn!(ProcessId::current(), "⚠️ Failed {}: {}", file.path.display(), reason);
                        summary.files_failed += 1;
                        continue;
                    }
                    Ok(result) => result,
                    Err(e) => {
                        process_warn!(ProcessId::current(), "⚠️ Failed {}: {}", file.path.display(), e);
                        summary.files_failed += 1;
                        continue;
                    }
                };
                summary.files_processed += 1;

                if result.status != FileStatus::Success {
                    continue;
                }
                match self.chunker.create_chunks(&result).await {
                    Ok(chunks) => chunking.merge(chunks),
                    Err(e) => {
                        chunking.failed += 1;
                        chunking.errors.push(format!("{}: {}", file.path.display(), e));
                    }
                }
            }

            if !chunking.chunks.is_empty() && !self.store.store_results(&chunking, directory).await? {
                return Err(WorkerError::StoreRejected { batch: batch_index });
            }
            summary.chunks_created += chunking.created;

            emit(
                out,
                &WorkerReport::Progress {
                    files_processed: summary.files_processed,
                    files_failed: summary.files_failed,
                    chunks_created: summary.chunks_created,
                },
            )?;
            logging::log_progress(
                ProcessId::current(),
                "batch",
                &format!(
                    "{}/{} files handled",
                    summary.files_processed + summary.files_failed,
                    summary.files_found
                ),
            );
            if !chunking.errors.is_empty() {
                process_debug!(ProcessId::current(), "Chunking errors: {:?}", chunking.errors);
            }
        }

        Ok(summary)
    }
}

fn emit<W: Write>(out: &mut W, report: &WorkerReport) -> WorkerResult<()> {
    writeln!(out, "{}", report.to_line()?)?;
    out.flush()?;
    Ok(())
}
