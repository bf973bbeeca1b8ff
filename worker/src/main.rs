//! Worker binary entry point

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use orchestrator::services::{FsDirectoryScanner, JsonlChunkStore, ParagraphChunker, TextFileProcessor};
use shared::logging::{self, LogOutput};
use shared::{ProcessId, WorkerExitCode};
use worker::{Worker, WorkerConfig, WorkerError, WorkerSummary};

#[derive(Parser)]
#[command(name = "worker")]
#[command(about = "Ingests one directory and reports progress on stdout")]
struct Args {
    /// Directory to ingest
    #[arg(long)]
    directory: PathBuf,

    /// Files per batch
    #[arg(long, default_value_t = 50)]
    chunk_size: usize,

    /// Root of the chunk store
    #[arg(long, env = "INGEST_OUTPUT_DIR", default_value = "./output")]
    output_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "INGEST_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Maximum characters per chunk
    #[arg(long, default_value_t = 2000)]
    max_chunk_chars: usize,

    /// Restarts the supervisor performed before this launch
    #[arg(long, default_value_t = 0)]
    restart_count: u32,

    /// Restrict ingestion to these extensions (comma separated)
    #[arg(long, value_delimiter = ',')]
    extensions: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    let args = Args::parse();

    let process_id = ProcessId::init_worker(std::process::id());
    logging::init_tracing_with_level(Some(&args.log_level), LogOutput::Stderr);
    logging::log_startup(
        process_id,
        &format!("worker for {} (restart {})", args.directory.display(), args.restart_count),
    );

    match run(args).await {
        Ok(summary) => {
            logging::log_shutdown(
                process_id,
                &format!("completed in {:.2}s", summary.processing_time),
            );
            Ok(())
        }
        Err(e) => {
            logging::log_error(process_id, "Ingestion", &format!("{e:#}"));
            let code = e
                .downcast_ref::<WorkerError>()
                .map(WorkerError::exit_code)
                .unwrap_or(WorkerExitCode::ProcessingFailed);
            std::process::exit(code.code());
        }
    }
}

async fn run(args: Args) -> anyhow::Result<WorkerSummary> {
    if args.max_chunk_chars == 0 {
        return Err(WorkerError::InvalidArguments {
            message: "max chunk chars must be greater than 0".to_string(),
        }
        .into());
    }

    let mut scanner = FsDirectoryScanner::new();
    if !args.extensions.is_empty() {
        scanner = scanner.with_extensions(&args.extensions);
    }

    let worker = Worker::new(
        WorkerConfig {
            directory: args.directory.clone(),
            chunk_size: args.chunk_size,
        },
        scanner,
        TextFileProcessor::new(),
        ParagraphChunker::new(args.max_chunk_chars),
        JsonlChunkStore::with_base_dir(&args.output_dir),
    )?;

    spawn_stop_listener(worker.stop_handle());

    let mut stdout = std::io::stdout();
    let summary = worker
        .run(&mut stdout)
        .await
        .with_context(|| format!("ingesting {}", args.directory.display()))?;
    Ok(summary)
}

/// Finish the current batch and exit when the supervisor asks us to stop
fn spawn_stop_listener(should_stop: std::sync::Arc<std::sync::atomic::AtomicBool>) {
    tokio::spawn(async move {
        wait_for_stop_signal().await;
        logging::log_shutdown(ProcessId::current(), "stop requested");
        should_stop.store(true, std::sync::atomic::Ordering::Relaxed);
    });
}

#[cfg(unix)]
async fn wait_for_stop_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = terminate.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_stop_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
