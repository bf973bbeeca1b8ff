//! Configuration for the directory orchestrator and the worker process manager

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{OrchestratorError, OrchestratorResult};

/// Directory pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Directories allowed mid-pipeline at once
    pub max_concurrent_directories: usize,
    /// Upper bound for one directory run, in seconds
    pub processing_timeout: f64,
    /// Explicit retries allowed per directory
    pub retry_attempts: u32,
    pub enable_parallel_processing: bool,
    pub enable_progress_tracking: bool,
    pub enable_error_recovery: bool,
    pub enable_cleanup_on_failure: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_directories: 5,
            processing_timeout: 3600.0,
            retry_attempts: 3,
            enable_parallel_processing: true,
            enable_progress_tracking: true,
            enable_error_recovery: true,
            enable_cleanup_on_failure: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.max_concurrent_directories == 0 {
            return Err(OrchestratorError::config(
                "max_concurrent_directories",
                "must be greater than 0",
            ));
        }
        validate_seconds("processing_timeout", self.processing_timeout)
    }

    pub fn processing_timeout(&self) -> Duration {
        seconds(self.processing_timeout)
    }
}

/// Worker process manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildProcessConfig {
    /// Ceiling on concurrently running worker processes
    pub max_workers: usize,
    /// Upper bound for one worker's run, in seconds
    pub worker_timeout: f64,
    /// Files handed to a worker per batch
    pub chunk_size: usize,
    pub enable_graceful_shutdown: bool,
    pub auto_restart_failed_workers: bool,
    pub max_restart_attempts: u32,
    /// Seconds between health monitor passes
    pub health_check_interval: f64,
    /// Seconds to wait for a worker to exit after termination.
    /// `None` waits up to `worker_timeout`.
    pub stop_timeout: Option<f64>,
}

impl Default for ChildProcessConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            worker_timeout: 3600.0,
            chunk_size: 50,
            enable_graceful_shutdown: true,
            auto_restart_failed_workers: true,
            max_restart_attempts: 3,
            health_check_interval: 5.0,
            stop_timeout: None,
        }
    }
}

impl ChildProcessConfig {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.max_workers == 0 {
            return Err(OrchestratorError::config("max_workers", "must be greater than 0"));
        }
        if self.chunk_size == 0 {
            return Err(OrchestratorError::config("chunk_size", "must be greater than 0"));
        }
        validate_seconds("worker_timeout", self.worker_timeout)?;
        validate_seconds("health_check_interval", self.health_check_interval)?;
        if let Some(stop_timeout) = self.stop_timeout {
            validate_seconds("stop_timeout", stop_timeout)?;
        }
        Ok(())
    }

    pub fn worker_timeout(&self) -> Duration {
        seconds(self.worker_timeout)
    }

    pub fn stop_timeout(&self) -> Duration {
        seconds(self.stop_timeout.unwrap_or(self.worker_timeout))
    }

    pub fn health_check_interval(&self) -> Duration {
        seconds(self.health_check_interval)
    }
}

/// Longest accepted duration setting: one hundred years
const MAX_SECONDS: f64 = 100.0 * 365.0 * 86_400.0;

fn validate_seconds(field: &str, value: f64) -> OrchestratorResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(OrchestratorError::config(field, format!("must be a positive number of seconds, got {value}")));
    }
    if value > MAX_SECONDS || Duration::try_from_secs_f64(value).is_err() {
        return Err(OrchestratorError::config(field, format!("must be at most {MAX_SECONDS} seconds, got {value}")));
    }
    Ok(())
}

/// Seconds as a `Duration`, saturating for values that were never validated
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(OrchestratorConfig::default().validate().is_ok());
        assert!(ChildProcessConfig::default().validate().is_ok());
        assert_eq!(OrchestratorConfig::default().max_concurrent_directories, 5);
        assert_eq!(OrchestratorConfig::default().retry_attempts, 3);
    }

    #[test]
    fn test_orchestrator_config_rejects_bad_bounds() {
        let config = OrchestratorConfig {
            max_concurrent_directories: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("max_concurrent_directories"));

        let config = OrchestratorConfig {
            processing_timeout: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = OrchestratorConfig {
            processing_timeout: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_child_process_config_rejects_bad_bounds() {
        for config in [
            ChildProcessConfig { max_workers: 0, ..Default::default() },
            ChildProcessConfig { chunk_size: 0, ..Default::default() },
            ChildProcessConfig { worker_timeout: 0.0, ..Default::default() },
            ChildProcessConfig { stop_timeout: Some(0.0), ..Default::default() },
        ] {
            assert!(config.validate().is_err(), "{config:?} should be rejected");
        }
    }

    #[test]
    fn test_oversized_durations_are_rejected() {
        for value in [1e20, f64::MAX, MAX_SECONDS * 2.0] {
            let config = OrchestratorConfig {
                processing_timeout: value,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "processing_timeout {value} accepted");

            for config in [
                ChildProcessConfig { worker_timeout: value, ..Default::default() },
                ChildProcessConfig { health_check_interval: value, ..Default::default() },
                ChildProcessConfig { stop_timeout: Some(value), ..Default::default() },
            ] {
                assert!(config.validate().is_err(), "{config:?} accepted");
            }
        }

        let config = OrchestratorConfig {
            processing_timeout: MAX_SECONDS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duration_accessors_saturate() {
        let config = ChildProcessConfig {
            worker_timeout: 1e20,
            health_check_interval: f64::INFINITY,
            ..Default::default()
        };
        assert_eq!(config.worker_timeout(), Duration::MAX);
        assert_eq!(config.stop_timeout(), Duration::MAX);
        assert_eq!(config.health_check_interval(), Duration::MAX);
    }

    #[test]
    fn test_stop_timeout_falls_back_to_worker_timeout() {
        let config = ChildProcessConfig {
            worker_timeout: 12.0,
            ..Default::default()
        };
        assert_eq!(config.stop_timeout(), Duration::from_secs(12));

        let config = ChildProcessConfig {
            stop_timeout: Some(0.5),
            ..config
        };
        assert_eq!(config.stop_timeout(), Duration::from_millis(500));
    }
}
