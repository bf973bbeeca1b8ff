//! Worker process lifecycle management
//!
//! Owns the table of live worker OS processes: spawns them under the worker
//! ceiling, stops and restarts them, and runs a background health monitor
//! that restarts crashed workers within a bounded budget.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use shared::{logging, process_debug, process_error, process_info, process_warn, ProcessId};

use crate::config::ChildProcessConfig;
use crate::core::{ChildProcessResult, WorkerProcessInfo, WorkerStatus};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{LockManager, ProcessControl, WorkerLaunch};

/// Grace period after a forced kill before giving up on the process
const KILL_WAIT: Duration = Duration::from_secs(5);

/// What one health monitor pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthCheckSummary {
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
    pub restarted: usize,
    pub cleaned: usize,
}

/// Supervisor of per-directory worker processes
pub struct ChildProcessManager<P>
where
    P: ProcessControl,
{
    config: ChildProcessConfig,
    control: P,
    locks: Arc<dyn LockManager>,
    /// Active workers keyed by OS pid
    workers: Mutex<HashMap<u32, WorkerProcessInfo>>,
    shutdown_tx: watch::Sender<bool>,
}

impl<P> ChildProcessManager<P>
where
    P: ProcessControl,
{
    /// Create a manager, failing fast on an invalid configuration
    pub fn new(config: ChildProcessConfig, control: P, locks: Arc<dyn LockManager>) -> OrchestratorResult<Self> {
        config.validate()?;
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            control,
            locks,
            workers: Mutex::new(HashMap::new()),
            shutdown_tx,
        })
    }

    pub fn config(&self) -> &ChildProcessConfig {
        &self.config
    }

    pub async fn worker_count(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Spawn a worker for `directory_path`
    pub async fn start_worker(&self, directory_path: impl AsRef<Path>) -> ChildProcessResult {
        self.spawn_worker(directory_path.as_ref(), 0).await
    }

    /// Stop a worker and release its directory
    ///
    /// Stopping a worker whose process already exited still succeeds and
    /// still releases the lock.
    pub async fn stop_worker(&self, pid: u32) -> ChildProcessResult {
        let started = Instant::now();

        let info = {
            let mut workers = self.workers.lock().await;
            match workers.get_mut(&pid) {
                Some(info) => {
                    // Keeps the health monitor away while we terminate
                    info.mark_stopped();
                    info.clone()
                }
                None => {
                    return ChildProcessResult::failed(OrchestratorError::WorkerNotFound { pid }, None, started);
                }
            }
        };

        let termination = self.terminate_process(pid).await;
        let mut info = self.discard(pid).await.unwrap_or(info);
        info.mark_stopped();

        match termination {
            Ok(forced) => {
                process_info!(
                    ProcessId::current(),
                    "🛑 Stopped worker {} for {}{}",
                    pid,
                    info.directory_path.display(),
                    if forced { " (forced)" } else { "" }
                );
                ChildProcessResult::succeeded(info, started)
                    .with_processing_result(serde_json::json!({ "forced": forced }))
            }
            Err(e) => {
                process_error!(ProcessId::current(), "❌ Worker {} did not stop cleanly: {}", pid, e);
                ChildProcessResult::failed(e, Some(info), started)
            }
        }
    }

    /// Snapshot of one worker, refreshing its activity and progress
    pub async fn get_worker_status(&self, pid: u32) -> OrchestratorResult<WorkerProcessInfo> {
        let mut workers = self.workers.lock().await;
        let info = workers.get_mut(&pid).ok_or(OrchestratorError::WorkerNotFound { pid })?;
        self.refresh(info).await;
        Ok(info.clone())
    }

    /// Snapshot of every active worker
    pub async fn get_all_workers_status(&self) -> HashMap<u32, WorkerProcessInfo> {
        let mut workers = self.workers.lock().await;
        for info in workers.values_mut() {
            self.refresh(info).await;
        }
        workers.clone()
    }

    /// Stop a worker and start a new one on the same directory
    pub async fn restart_worker(&self, pid: u32) -> ChildProcessResult {
        let started = Instant::now();
        let info = match self.workers.lock().await.get(&pid) {
            Some(info) => info.clone(),
            None => return ChildProcessResult::failed(OrchestratorError::WorkerNotFound { pid }, None, started),
        };

        let stopped = self.stop_worker(pid).await;
        if !stopped.success {
            process_warn!(
                ProcessId::current(),
                "⚠️ Restarting worker {} despite stop error: {}",
                pid,
                stopped.error_message.as_deref().unwrap_or("unknown")
            );
        }

        let result = self.spawn_worker(&info.directory_path, info.restart_count + 1).await;
        if let Some(new_info) = &result.worker_info {
            process_info!(
                ProcessId::current(),
                "🔄 Restarted worker {} as {} (restart {})",
                pid,
                new_info.process_id,
                new_info.restart_count
            );
        }
        result
    }

    /// Remove every worker whose process is no longer running
    ///
    /// Returns the number of entries removed.
    pub async fn cleanup_failed_workers(&self) -> usize {
        let pids: Vec<u32> = self.workers.lock().await.keys().copied().collect();
        let mut removed = 0;
        for pid in pids {
            if self.control.is_running(pid).await {
                continue;
            }
            if self.discard(pid).await.is_some() {
                process_debug!(ProcessId::current(), "🧹 Cleaned up dead worker {}", pid);
                removed += 1;
            }
        }
        removed
    }

    /// Stop every worker and signal the health monitor to exit
    ///
    /// Succeeds only if no worker remains afterwards.
    pub async fn shutdown_all_workers(&self) -> bool {
        self.signal_shutdown();

        let pids: Vec<u32> = self.workers.lock().await.keys().copied().collect();
        for pid in &pids {
            let result = self.stop_worker(*pid).await;
            if !result.success {
                process_warn!(
                    ProcessId::current(),
                    "⚠️ Worker {} stop reported: {}",
                    pid,
                    result.error_message.as_deref().unwrap_or("unknown")
                );
            }
        }

        let remaining = self.workers.lock().await.len();
        if remaining == 0 {
            logging::log_success(ProcessId::current(), &format!("All {} workers shut down", pids.len()));
        } else {
            process_error!(ProcessId::current(), "❌ {} workers still registered after shutdown", remaining);
        }
        remaining == 0
    }

    /// Ask the health monitor to exit
    pub fn signal_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// React to a crashed worker with the bounded restart policy
    ///
    /// The failed entry is always discarded. A replacement is started only
    /// when auto-restart is on and the restart budget is not exhausted.
    pub async fn handle_worker_failure(&self, pid: u32, error: &str) -> Option<ChildProcessResult> {
        let mut info = self.discard(pid).await?;
        info.mark_failed(error);
        process_error!(
            ProcessId::current(),
            "💥 Worker {} for {} failed: {}",
            pid,
            info.directory_path.display(),
            error
        );

        let may_restart =
            self.config.auto_restart_failed_workers && info.restart_count < self.config.max_restart_attempts;
        if !may_restart {
            process_warn!(
                ProcessId::current(),
                "⚠️ Abandoning {} after {} restarts",
                info.directory_path.display(),
                info.restart_count
            );
            return None;
        }

        let result = self.spawn_worker(&info.directory_path, info.restart_count + 1).await;
        if !result.success {
            process_error!(
                ProcessId::current(),
                "❌ Replacement for worker {} failed to start: {}",
                pid,
                result.error_message.as_deref().unwrap_or("unknown")
            );
        }
        Some(result)
    }

    /// One health monitor pass over the running workers
    pub async fn check_worker_health(&self) -> HealthCheckSummary {
        let mut summary = HealthCheckSummary::default();
        let running: Vec<WorkerProcessInfo> = self
            .workers
            .lock()
            .await
            .values()
            .filter(|info| info.status == WorkerStatus::Running)
            .cloned()
            .collect();

        for info in running {
            summary.checked += 1;
            let pid = info.process_id;

            let failure = if self.control.is_running(pid).await {
                if info.runtime_seconds() <= self.config.worker_timeout {
                    continue;
                }
                if let Err(e) = self.terminate_process(pid).await {
                    process_warn!(ProcessId::current(), "⚠️ Timed out worker {} did not stop: {}", pid, e);
                }
                format!("Worker timed out after {:.0}s", self.config.worker_timeout)
            } else {
                match self.control.exit_code(pid).await {
                    Some(0) => {
                        if self.discard(pid).await.is_some() {
                            summary.completed += 1;
                            process_info!(
                                ProcessId::current(),
                                "✅ Worker {} finished {}",
                                pid,
                                info.directory_path.display()
                            );
                        }
                        continue;
                    }
                    Some(code) => format!("Worker exited with code {code}"),
                    None => "Worker process is no longer running".to_string(),
                }
            };

            summary.failed += 1;
            if let Some(result) = self.handle_worker_failure(pid, &failure).await {
                if result.success {
                    summary.restarted += 1;
                }
            }
        }

        summary.cleaned = self.cleanup_failed_workers().await;
        summary
    }

    /// Start the background health monitor
    ///
    /// The loop sleeps between passes and exits within one poll interval of
    /// `signal_shutdown`.
    pub fn spawn_health_monitor(self: &Arc<Self>) -> JoinHandle<()>
    where
        P: 'static,
    {
        let manager = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(manager.config.health_check_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            process_debug!(ProcessId::current(), "🩺 Health monitor started");

            loop {
                if *shutdown_rx.borrow_and_update() {
                    break;
                }
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let summary = manager.check_worker_health().await;
                        if summary.failed > 0 || summary.cleaned > 0 {
                            process_info!(
                                ProcessId::current(),
                                "🩺 Health check: {} failed, {} restarted, {} cleaned",
                                summary.failed,
                                summary.restarted,
                                summary.cleaned
                            );
                        }
                    }
                }
            }

            process_debug!(ProcessId::current(), "🩺 Health monitor stopped");
        })
    }

    async fn spawn_worker(&self, directory: &Path, restart_count: u32) -> ChildProcessResult {
        let started = Instant::now();

        if !tokio::fs::metadata(directory).await.map(|m| m.is_dir()).unwrap_or(false) {
            return ChildProcessResult::failed(
                OrchestratorError::DirectoryNotFound {
                    path: directory.to_path_buf(),
                },
                None,
                started,
            );
        }

        // Held across the spawn so concurrent starts cannot pass the ceiling
        let mut workers = self.workers.lock().await;
        if workers.len() >= self.config.max_workers {
            process_warn!(
                ProcessId::current(),
                "⚠️ Worker limit {} reached, not starting {}",
                self.config.max_workers,
                directory.display()
            );
            return ChildProcessResult::failed(
                OrchestratorError::WorkerLimitReached {
                    max_workers: self.config.max_workers,
                },
                None,
                started,
            );
        }

        if let Err(e) = self.locks.acquire_lock(directory).await {
            return ChildProcessResult::failed(e, None, started);
        }

        let launch = WorkerLaunch {
            directory_path: directory.to_path_buf(),
            chunk_size: self.config.chunk_size,
            restart_count,
        };
        let pid = match self.control.spawn(&launch).await {
            Ok(pid) => pid,
            Err(e) => {
                self.release_lock(directory).await;
                process_error!(ProcessId::current(), "❌ Failed to spawn worker for {}: {}", directory.display(), e);
                return ChildProcessResult::failed(e, None, started);
            }
        };

        let info = WorkerProcessInfo::running(pid, directory, restart_count);
        workers.insert(pid, info.clone());
        process_info!(
            ProcessId::current(),
            "🏭 Started worker {} for {} (restart {})",
            pid,
            directory.display(),
            restart_count
        );
        ChildProcessResult::succeeded(info, started)
    }

    /// Terminate a process, escalating to a kill when it does not exit
    ///
    /// Returns whether a forced kill was needed. An already-exited process
    /// is a success.
    async fn terminate_process(&self, pid: u32) -> OrchestratorResult<bool> {
        if !self.control.is_running(pid).await {
            return Ok(false);
        }

        if self.config.enable_graceful_shutdown {
            self.control.terminate(pid).await?;
            if self.control.wait(pid, self.config.stop_timeout()).await? {
                return Ok(false);
            }
            process_warn!(
                ProcessId::current(),
                "🔨 Worker {} ignored termination for {:?}, killing",
                pid,
                self.config.stop_timeout()
            );
        }

        self.control.kill(pid).await?;
        if self.control.wait(pid, KILL_WAIT).await? {
            Ok(true)
        } else {
            Err(OrchestratorError::process(format!("Worker {pid} still running after kill")))
        }
    }

    /// Remove an entry and release what it held
    ///
    /// Only the caller that actually removed the entry releases the lock.
    async fn discard(&self, pid: u32) -> Option<WorkerProcessInfo> {
        let info = self.workers.lock().await.remove(&pid)?;
        self.control.forget(pid).await;
        self.release_lock(&info.directory_path).await;
        Some(info)
    }

    async fn release_lock(&self, directory: &Path) {
        if let Err(e) = self.locks.release_lock(directory).await {
            process_error!(
                ProcessId::current(),
                "❌ Failed to release lock for {}: {}",
                directory.display(),
                e
            );
        }
    }

    async fn refresh(&self, info: &mut WorkerProcessInfo) {
        if let Some(files_processed) = self.control.files_processed(info.process_id).await {
            info.files_processed = files_processed;
        }
        info.last_activity = chrono::Utc::now();
    }
}
