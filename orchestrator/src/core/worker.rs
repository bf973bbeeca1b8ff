//! Worker process records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// Lifecycle state of one worker process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Running,
    Stopped,
    Failed,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Snapshot of one worker OS process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProcessInfo {
    pub process_id: u32,
    pub directory_path: PathBuf,
    pub status: WorkerStatus,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub files_processed: u64,
    pub restart_count: u32,
    pub error_message: Option<String>,
}

impl WorkerProcessInfo {
    pub fn running(process_id: u32, directory_path: impl Into<PathBuf>, restart_count: u32) -> Self {
        let now = Utc::now();
        Self {
            process_id,
            directory_path: directory_path.into(),
            status: WorkerStatus::Running,
            start_time: now,
            last_activity: now,
            files_processed: 0,
            restart_count,
            error_message: None,
        }
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = WorkerStatus::Failed;
        self.error_message = Some(error.into());
        self.last_activity = Utc::now();
    }

    pub fn mark_stopped(&mut self) {
        self.status = WorkerStatus::Stopped;
        self.last_activity = Utc::now();
    }

    pub fn runtime_seconds(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds().max(0) as f64 / 1000.0
    }
}

/// Outcome of one process manager operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildProcessResult {
    pub success: bool,
    pub worker_info: Option<WorkerProcessInfo>,
    pub error_message: Option<String>,
    pub processing_result: Option<serde_json::Value>,
    /// Seconds spent in the operation
    pub execution_time: f64,
}

impl ChildProcessResult {
    pub fn succeeded(worker_info: WorkerProcessInfo, started: Instant) -> Self {
        Self {
            success: true,
            worker_info: Some(worker_info),
            error_message: None,
            processing_result: None,
            execution_time: started.elapsed().as_secs_f64(),
        }
    }

    pub fn failed(error: impl fmt::Display, worker_info: Option<WorkerProcessInfo>, started: Instant) -> Self {
        Self {
            success: false,
            worker_info,
            error_message: Some(error.to_string()),
            processing_result: None,
            execution_time: started.elapsed().as_secs_f64(),
        }
    }

    pub fn with_processing_result(mut self, result: serde_json::Value) -> Self {
        self.processing_result = Some(result);
        self
    }
}
