//! Main entry point for the orchestrator binary
//!
//! Ingests directories either in-process through `DirectoryOrchestrator` or,
//! with `--workers`, by supervising one worker process per directory with
//! `ChildProcessManager`.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

use orchestrator::{
    services::{
        FileLockManager, FsDirectoryScanner, JsonlChunkStore, ParagraphChunker, RealProcessControl, TextFileProcessor,
    },
    ChildProcessConfig, ChildProcessManager, DirectoryOrchestrator, LockManager, OrchestrationResult, OrchestratorConfig,
    OrchestratorResult,
};
use shared::{logging, process_debug, process_info, process_warn, ProcessId};

/// Orchestrator for directory ingestion
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Scans directories, extracts their text and stores it as chunks")]
pub struct Args {
    /// Directories to ingest
    #[arg(required = true)]
    pub directories: Vec<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "INGEST_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Output directory for stored chunks
    #[arg(long, env = "INGEST_OUTPUT_DIR", default_value = "./output")]
    pub output_dir: PathBuf,

    /// Directory holding lock files (defaults to <output-dir>/.locks)
    #[arg(long, env = "INGEST_LOCK_DIR")]
    pub lock_dir: Option<PathBuf>,

    /// Directories processed concurrently in-process
    #[arg(long, default_value = "5")]
    pub max_concurrent: usize,

    /// Per-directory (or per-worker) timeout in seconds
    #[arg(long, default_value = "3600")]
    pub timeout: f64,

    /// Process directories one after another
    #[arg(long)]
    pub sequential: bool,

    /// Fail a directory on its first failing file
    #[arg(long)]
    pub strict: bool,

    /// Comma separated extension allow-list
    #[arg(long, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Only scan the top level of each directory
    #[arg(long)]
    pub non_recursive: bool,

    /// Upper bound on characters per chunk
    #[arg(long, default_value = "2000")]
    pub max_chunk_chars: usize,

    /// Run one worker process per directory instead of in-process
    #[arg(long)]
    pub workers: bool,

    /// Worker mode: maximum concurrent worker processes
    #[arg(long, default_value = "4")]
    pub max_workers: usize,

    /// Worker mode: files per batch
    #[arg(long, default_value = "50")]
    pub chunk_size: usize,

    /// Worker mode: path of the worker binary
    #[arg(long, env = "INGEST_WORKER_PROGRAM")]
    pub worker_program: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> OrchestratorResult<()> {
    // Values from .env feed the `env` fallbacks of the arguments
    let _ = dotenv::dotenv();
    let args = Args::parse();

    ProcessId::init_orchestrator();
    logging::init_tracing_with_level(Some(&args.log_level), logging::LogOutput::Stdout);

    let lock_dir = args.lock_dir.clone().unwrap_or_else(|| args.output_dir.join(".locks"));
    let locks: Arc<dyn LockManager> = Arc::new(FileLockManager::new(lock_dir));

    let success = if args.workers {
        run_workers(&args, locks).await?
    } else {
        run_in_process(&args, locks).await?
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_in_process(args: &Args, locks: Arc<dyn LockManager>) -> OrchestratorResult<bool> {
    logging::log_startup(ProcessId::current(), "directory orchestrator (in-process mode)");

    let config = OrchestratorConfig {
        max_concurrent_directories: args.max_concurrent,
        processing_timeout: args.timeout,
        enable_parallel_processing: !args.sequential,
        enable_error_recovery: !args.strict,
        ..OrchestratorConfig::default()
    };

    let mut scanner = FsDirectoryScanner::new().with_recursive(!args.non_recursive);
    if let Some(extensions) = &args.extensions {
        scanner = scanner.with_extensions(extensions);
    }

    let orchestrator = Arc::new(DirectoryOrchestrator::new(
        config,
        scanner,
        TextFileProcessor::new(),
        ParagraphChunker::new(args.max_chunk_chars),
        JsonlChunkStore::with_base_dir(&args.output_dir),
        locks,
    )?);

    let canceller = Arc::clone(&orchestrator);
    let signal_task = tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                logging::log_shutdown(ProcessId::current(), "Received Ctrl+C signal");
                canceller.stop_all_processing().await;
            }
            Err(err) => {
                logging::log_error(ProcessId::current(), "Signal handling", &err);
            }
        }
    });

    let results = orchestrator.process_multiple_directories(&args.directories).await?;
    signal_task.abort();

    for result in &results {
        if result.success {
            process_info!(
                ProcessId::current(),
                "✅ {}: {} files, {} chunks in {:.2}s",
                result.directory_path.display(),
                result.files_processed,
                result.chunks_created,
                result.processing_time
            );
        } else {
            process_warn!(
                ProcessId::current(),
                "❌ {}: {}",
                result.directory_path.display(),
                result.error_message.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let summary = OrchestrationResult::aggregate(&results);
    println!("{}", serde_json::to_string_pretty(&summary.metadata)?);
    Ok(summary.success)
}

async fn run_workers(args: &Args, locks: Arc<dyn LockManager>) -> OrchestratorResult<bool> {
    logging::log_startup(ProcessId::current(), "directory orchestrator (worker mode)");

    let config = ChildProcessConfig {
        max_workers: args.max_workers,
        worker_timeout: args.timeout,
        chunk_size: args.chunk_size,
        ..ChildProcessConfig::default()
    };
    let poll_interval = config.health_check_interval();

    let program = args
        .worker_program
        .clone()
        .unwrap_or_else(RealProcessControl::default_worker_program);
    process_debug!(ProcessId::current(), "Worker program: {}", program.display());

    let control = RealProcessControl::new(program)
        .with_output_dir(&args.output_dir)
        .with_log_level(args.log_level.clone());
    let manager = Arc::new(ChildProcessManager::new(config, control, locks)?);
    let monitor = manager.spawn_health_monitor();

    let mut started = 0usize;
    for directory in &args.directories {
        let result = manager.start_worker(directory).await;
        if result.success {
            started += 1;
        } else {
            process_warn!(
                ProcessId::current(),
                "❌ Could not start worker for {}: {}",
                directory.display(),
                result.error_message.as_deref().unwrap_or("unknown error")
            );
        }
    }

    // Workers leave the table when they finish, fail for good, or stop
    let mut interrupted = false;
    while manager.worker_count().await > 0 {
        tokio::select! {
            _ = signal::ctrl_c() => {
                logging::log_shutdown(ProcessId::current(), "Received Ctrl+C signal");
                interrupted = true;
                break;
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    manager.shutdown_all_workers().await;
    let _ = monitor.await;

    logging::log_success(ProcessId::current(), "Orchestrator stopped gracefully");
    Ok(!interrupted && started == args.directories.len())
}
