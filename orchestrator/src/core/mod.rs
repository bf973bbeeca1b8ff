//! Core records and state machines
//!
//! Plain data with no I/O: the directory pipeline status and the worker
//! process snapshot, plus the result values built from them.

pub mod status;
pub mod worker;

pub use status::{DirectoryProcessingStatus, OrchestrationResult, ProcessingStage};
pub use worker::{ChildProcessResult, WorkerProcessInfo, WorkerStatus};
