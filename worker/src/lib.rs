//! Worker library for single-directory ingestion
//!
//! A worker process ingests exactly one directory in batches and reports
//! its progress to the supervising process as JSON lines on stdout.

pub mod error;
pub mod worker_impl;

// Re-export main types
pub use error::{WorkerError, WorkerResult};
pub use worker_impl::{Worker, WorkerConfig, WorkerSummary};
