//! Directory pipeline state
//!
//! `DirectoryProcessingStatus` is the live record the orchestrator keeps per
//! directory; `OrchestrationResult` is the value handed back once a run ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Pipeline stage of one directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Pending,
    Scanning,
    Processing,
    Chunking,
    Storing,
    Completed,
    Failed,
    Cancelled,
}

impl ProcessingStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `next` is a legal transition from this stage
    ///
    /// Forward moves follow scan → process → chunk → store → completed, with
    /// the zero-file shortcut scanning → completed. Failed and cancelled are
    /// reachable from every non-terminal stage.
    pub fn can_transition_to(self, next: ProcessingStage) -> bool {
        use ProcessingStage::*;
        if self.is_terminal() {
            return false;
        }
        match next {
            Failed | Cancelled => true,
            Scanning => self == Pending,
            Processing => self == Scanning,
            Chunking => self == Processing,
            Storing => self == Chunking,
            Completed => matches!(self, Scanning | Storing),
            Pending => false,
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Scanning => "scanning",
            Self::Processing => "processing",
            Self::Chunking => "chunking",
            Self::Storing => "storing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Live progress of one directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryProcessingStatus {
    pub directory_path: PathBuf,
    pub status: ProcessingStage,
    pub files_found: u64,
    pub files_processed: u64,
    pub files_failed: u64,
    pub chunks_created: u64,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    progress_percentage: f64,
    pub error_message: Option<String>,
    /// Seconds from `start_time` to the terminal transition
    pub processing_time: Option<f64>,
}

impl DirectoryProcessingStatus {
    pub fn new(directory_path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            directory_path: directory_path.into(),
            status: ProcessingStage::Pending,
            files_found: 0,
            files_processed: 0,
            files_failed: 0,
            chunks_created: 0,
            start_time: now,
            last_activity: now,
            progress_percentage: 0.0,
            error_message: None,
            processing_time: None,
        }
    }

    /// Construct with an initial progress value (clamped)
    pub fn with_progress(mut self, progress: f64) -> Self {
        self.set_progress(progress);
        self
    }

    pub fn progress_percentage(&self) -> f64 {
        self.progress_percentage
    }

    /// Store progress clamped to [0, 100]; NaN counts as 0
    pub fn set_progress(&mut self, progress: f64) {
        self.progress_percentage = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 100.0) };
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Move to `next`, returning false (and changing nothing) for an illegal move
    pub fn transition(&mut self, next: ProcessingStage) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.touch();
        if next.is_terminal() {
            self.processing_time = Some(self.elapsed_seconds());
        }
        true
    }

    /// Transition to failed and keep the message
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        let moved = self.transition(ProcessingStage::Failed);
        if moved {
            self.error_message = Some(message.into());
        }
        moved
    }

    /// Record found-file count; processed/failed never exceed it
    pub fn set_files_found(&mut self, files_found: u64) {
        self.files_found = files_found;
        self.touch();
    }

    /// Count one processed file, saturating at `files_found`
    pub fn record_file_processed(&mut self) {
        if self.files_handled() < self.files_found {
            self.files_processed += 1;
        }
        self.touch();
    }

    /// Count one failed file, saturating at `files_found`
    pub fn record_file_failed(&mut self) {
        if self.files_handled() < self.files_found {
            self.files_failed += 1;
        }
        self.touch();
    }

    pub fn files_handled(&self) -> u64 {
        self.files_processed + self.files_failed
    }

    pub fn elapsed_seconds(&self) -> f64 {
        let elapsed = Utc::now() - self.start_time;
        elapsed.num_milliseconds().max(0) as f64 / 1000.0
    }
}

/// Outcome of one orchestration call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub success: bool,
    pub directory_path: PathBuf,
    pub files_processed: u64,
    pub files_failed: u64,
    pub chunks_created: u64,
    pub processing_time: f64,
    pub error_message: Option<String>,
    pub status_updates: Vec<DirectoryProcessingStatus>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl OrchestrationResult {
    /// Failure that never created pipeline state (not found, conflict, ...)
    pub fn rejected(directory_path: &Path, error: impl fmt::Display) -> Self {
        Self {
            success: false,
            directory_path: directory_path.to_path_buf(),
            files_processed: 0,
            files_failed: 0,
            chunks_created: 0,
            processing_time: 0.0,
            error_message: Some(error.to_string()),
            status_updates: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Build from the terminal status and the snapshots captured on the way
    pub fn from_final_status(final_status: &DirectoryProcessingStatus, mut status_updates: Vec<DirectoryProcessingStatus>) -> Self {
        if status_updates.last() != Some(final_status) {
            status_updates.push(final_status.clone());
        }
        let mut metadata = serde_json::Map::new();
        metadata.insert("final_status".into(), final_status.status.to_string().into());
        metadata.insert("files_found".into(), final_status.files_found.into());

        Self {
            success: final_status.status == ProcessingStage::Completed,
            directory_path: final_status.directory_path.clone(),
            files_processed: final_status.files_processed,
            files_failed: final_status.files_failed,
            chunks_created: final_status.chunks_created,
            processing_time: final_status.processing_time.unwrap_or_else(|| final_status.elapsed_seconds()),
            error_message: final_status.error_message.clone(),
            status_updates,
            metadata,
        }
    }

    pub fn final_status(&self) -> Option<ProcessingStage> {
        self.status_updates.last().map(|s| s.status)
    }

    /// Fold per-directory results into one summary
    pub fn aggregate(results: &[OrchestrationResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        let errors: Vec<String> = results
            .iter()
            .filter_map(|r| {
                r.error_message
                    .as_ref()
                    .map(|e| format!("{}: {}", r.directory_path.display(), e))
            })
            .collect();

        let mut metadata = serde_json::Map::new();
        metadata.insert("directories".into(), results.len().into());
        metadata.insert("succeeded".into(), succeeded.into());
        metadata.insert("failed".into(), (results.len() - succeeded).into());

        Self {
            success: !results.is_empty() && succeeded == results.len(),
            directory_path: PathBuf::new(),
            files_processed: results.iter().map(|r| r.files_processed).sum(),
            files_failed: results.iter().map(|r| r.files_failed).sum(),
            chunks_created: results.iter().map(|r| r.chunks_created).sum(),
            processing_time: results.iter().map(|r| r.processing_time).fold(0.0, f64::max),
            error_message: if errors.is_empty() { None } else { Some(errors.join("; ")) },
            status_updates: results.iter().flat_map(|r| r.status_updates.last().cloned()).collect(),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_clamped() {
        let status = DirectoryProcessingStatus::new("/d").with_progress(150.0);
        assert_eq!(status.progress_percentage(), 100.0);

        let mut status = DirectoryProcessingStatus::new("/d").with_progress(-5.0);
        assert_eq!(status.progress_percentage(), 0.0);
        status.set_progress(f64::NAN);
        assert_eq!(status.progress_percentage(), 0.0);
        status.set_progress(42.5);
        assert_eq!(status.progress_percentage(), 42.5);
    }

    #[test]
    fn test_forward_transitions() {
        let mut status = DirectoryProcessingStatus::new("/d");
        for stage in [
            ProcessingStage::Scanning,
            ProcessingStage::Processing,
            ProcessingStage::Chunking,
            ProcessingStage::Storing,
            ProcessingStage::Completed,
        ] {
            assert!(status.transition(stage), "pending pipeline should reach {stage}");
        }
        assert!(status.processing_time.is_some());
    }

    #[test]
    fn test_illegal_transitions_are_refused() {
        let mut status = DirectoryProcessingStatus::new("/d");
        assert!(!status.transition(ProcessingStage::Chunking));
        assert_eq!(status.status, ProcessingStage::Pending);

        assert!(status.transition(ProcessingStage::Scanning));
        assert!(status.transition(ProcessingStage::Completed));
        // Terminal states are final
        assert!(!status.transition(ProcessingStage::Failed));
        assert!(!status.fail("late"));
        assert!(status.error_message.is_none());
    }

    #[test]
    fn test_file_counters_never_exceed_found() {
        let mut status = DirectoryProcessingStatus::new("/d");
        status.set_files_found(2);
        status.record_file_processed();
        status.record_file_failed();
        status.record_file_processed();
        assert_eq!(status.files_processed, 1);
        assert_eq!(status.files_failed, 1);
        assert!(status.files_handled() <= status.files_found);
    }

    #[test]
    fn test_result_from_final_status() {
        let mut status = DirectoryProcessingStatus::new("/d");
        status.transition(ProcessingStage::Scanning);
        let scanning = status.clone();
        status.fail("boom");

        let result = OrchestrationResult::from_final_status(&status, vec![scanning]);
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("boom"));
        assert_eq!(result.final_status(), Some(ProcessingStage::Failed));
        assert_eq!(result.status_updates.len(), 2);
    }

    #[test]
    fn test_aggregate() {
        let ok = OrchestrationResult {
            success: true,
            files_processed: 3,
            chunks_created: 7,
            processing_time: 1.5,
            ..OrchestrationResult::rejected(Path::new("/a"), "unused")
        };
        let ok = OrchestrationResult { error_message: None, ..ok };
        let failed = OrchestrationResult::rejected(Path::new("/b"), "Directory not found: /b");

        let summary = OrchestrationResult::aggregate(&[ok, failed]);
        assert!(!summary.success);
        assert_eq!(summary.files_processed, 3);
        assert_eq!(summary.chunks_created, 7);
        assert_eq!(summary.metadata["succeeded"], 1);
        assert!(summary.error_message.unwrap().contains("/b"));
    }
}
