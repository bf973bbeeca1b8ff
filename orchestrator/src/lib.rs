//! Orchestrator library for directory ingestion
//!
//! This library provides two coordinators built on injected collaborators:
//! `DirectoryOrchestrator` drives directories through the
//! scan → process → chunk → store pipeline in-process, while
//! `ChildProcessManager` supervises worker OS processes that each ingest one
//! directory.

pub mod child_process_manager;
pub mod config;
pub mod core;
pub mod directory_orchestrator;
pub mod error;
pub mod services;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use child_process_manager::{ChildProcessManager, HealthCheckSummary};
pub use config::{ChildProcessConfig, OrchestratorConfig};
pub use core::{
    ChildProcessResult, DirectoryProcessingStatus, OrchestrationResult, ProcessingStage, WorkerProcessInfo, WorkerStatus,
};
pub use directory_orchestrator::DirectoryOrchestrator;
pub use error::{ErrorKind, OrchestratorError, OrchestratorResult};
pub use traits::{Chunker, ChunkStore, DirectoryScanner, FileProcessor, LockManager, ProcessControl, WorkerLaunch};
pub use types::{BlockKind, Chunk, ChunkingResult, ContentBlock, FileInfo, FileProcessingResult, FileStatus};
