//! Real worker process control
//!
//! Spawns worker binaries with `tokio::process`, reads their stdout report
//! lines, and answers liveness queries. Each child is owned by a small
//! supervisor task so that waiting on one child never blocks queries about
//! another.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStdout, Command};
use tokio::sync::{oneshot, watch, Mutex};

use shared::{process_debug, process_warn, ProcessId, WorkerReport};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{ProcessControl, WorkerLaunch};

/// Poll period when waiting on a process we did not spawn
const FOREIGN_POLL: Duration = Duration::from_millis(100);

/// How a supervised child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExitRecord {
    /// `None` when killed by a signal or the wait itself failed
    code: Option<i32>,
}

/// Handle for a supervised child process
struct ChildHandle {
    exit_rx: watch::Receiver<Option<ExitRecord>>,
    kill_tx: Option<oneshot::Sender<()>>,
}

/// Real process control implementation
pub struct RealProcessControl {
    /// Path of the worker binary
    worker_program: PathBuf,

    /// Where workers persist their chunks
    output_dir: PathBuf,

    /// Log level to pass to spawned processes
    log_level: String,

    children: Mutex<HashMap<u32, ChildHandle>>,

    /// Latest `files_processed` reported per pid
    progress: Arc<Mutex<HashMap<u32, u64>>>,
}

impl RealProcessControl {
    /// Create with the worker binary at `worker_program`
    pub fn new(worker_program: impl Into<PathBuf>) -> Self {
        Self {
            worker_program: worker_program.into(),
            output_dir: PathBuf::from("./output"),
            log_level: "info".to_string(),
            children: Mutex::new(HashMap::new()),
            progress: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The `worker` binary next to the running executable
    pub fn default_worker_program() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("worker")))
            .unwrap_or_else(|| PathBuf::from("worker"))
    }

    /// Configure output directory (fluent API)
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Configure log level (fluent API)
    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }

    fn build_command(&self, launch: &WorkerLaunch) -> Command {
        let mut cmd = Command::new(&self.worker_program);
        cmd.arg("--directory")
            .arg(&launch.directory_path)
            .arg("--chunk-size")
            .arg(launch.chunk_size.to_string())
            .arg("--output-dir")
            .arg(&self.output_dir)
            .arg("--log-level")
            .arg(&self.log_level)
            .arg("--restart-count")
            .arg(launch.restart_count.to_string());

        // stdout carries report lines; logs go to stderr which we inherit
        cmd.stdout(Stdio::piped()).stderr(Stdio::inherit()).stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Consume report lines so the child never blocks on a full pipe
    fn spawn_report_reader(&self, pid: u32, stdout: ChildStdout) {
        let progress = Arc::clone(&self.progress);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match WorkerReport::from_line(&line) {
                    Ok(report) => {
                        if let Some(count) = report.files_processed() {
                            progress.lock().await.insert(pid, count);
                        }
                        if let WorkerReport::Failed { error } = &report {
                            process_warn!(ProcessId::current(), "⚠️ Worker {} reported failure: {}", pid, error);
                        }
                    }
                    Err(_) => {
                        process_debug!(ProcessId::current(), "worker {} stdout: {}", pid, line);
                    }
                }
            }
        });
    }

    async fn exit_state(&self, pid: u32) -> Option<Option<ExitRecord>> {
        self.children
            .lock()
            .await
            .get(&pid)
            .map(|handle| *handle.exit_rx.borrow())
    }
}

#[cfg(unix)]
fn foreign_process_running(pid: u32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;

    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        // EPERM: exists but owned by someone else
        Err(_) => true,
    }
}

#[cfg(not(unix))]
fn foreign_process_running(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn send_signal(pid: u32, sig: nix::sys::signal::Signal) -> OrchestratorResult<()> {
    use nix::sys::signal;
    use nix::unistd::Pid;

    match signal::kill(Pid::from_raw(pid as i32), sig) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(OrchestratorError::process(format!("Failed to send {sig} to {pid}: {e}"))),
    }
}

#[async_trait]
impl ProcessControl for RealProcessControl {
    async fn spawn(&self, launch: &WorkerLaunch) -> OrchestratorResult<u32> {
        let mut child = self
            .build_command(launch)
            .spawn()
            .map_err(|e| OrchestratorError::process(format!("Failed to spawn worker {}: {e}", self.worker_program.display())))?;

        let pid = child
            .id()
            .ok_or_else(|| OrchestratorError::process("Worker exited before its pid could be read"))?;

        if let Some(stdout) = child.stdout.take() {
            self.spawn_report_reader(pid, stdout);
        }

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx => {
                    let _ = child.start_kill();
                    child.wait().await
                }
            };
            let code = status.ok().and_then(|s| s.code());
            exit_tx.send_replace(Some(ExitRecord { code }));
        });

        self.children.lock().await.insert(
            pid,
            ChildHandle {
                exit_rx,
                kill_tx: Some(kill_tx),
            },
        );
        process_debug!(
            ProcessId::current(),
            "🏭 Spawned worker (PID: {}) for {}",
            pid,
            launch.directory_path.display()
        );
        Ok(pid)
    }

    async fn is_running(&self, pid: u32) -> bool {
        match self.exit_state(pid).await {
            Some(exit) => exit.is_none(),
            None => foreign_process_running(pid),
        }
    }

    async fn exit_code(&self, pid: u32) -> Option<i32> {
        self.exit_state(pid).await.flatten().and_then(|exit| exit.code)
    }

    async fn terminate(&self, pid: u32) -> OrchestratorResult<()> {
        #[cfg(unix)]
        {
            send_signal(pid, nix::sys::signal::Signal::SIGTERM)
        }

        #[cfg(not(unix))]
        {
            self.kill(pid).await
        }
    }

    async fn kill(&self, pid: u32) -> OrchestratorResult<()> {
        let kill_tx = self
            .children
            .lock()
            .await
            .get_mut(&pid)
            .map(|handle| handle.kill_tx.take());

        match kill_tx {
            Some(Some(tx)) => {
                // The supervisor may already have seen the exit
                let _ = tx.send(());
                Ok(())
            }
            Some(None) => Ok(()),
            None => {
                #[cfg(unix)]
                {
                    send_signal(pid, nix::sys::signal::Signal::SIGKILL)
                }
                #[cfg(not(unix))]
                {
                    Err(OrchestratorError::process(format!("Cannot kill unmanaged process {pid}")))
                }
            }
        }
    }

    async fn wait(&self, pid: u32, timeout: Duration) -> OrchestratorResult<bool> {
        let exit_rx = self
            .children
            .lock()
            .await
            .get(&pid)
            .map(|handle| handle.exit_rx.clone());

        match exit_rx {
            Some(mut rx) => match tokio::time::timeout(timeout, rx.wait_for(|exit| exit.is_some())).await {
                Ok(Ok(_)) => Ok(true),
                // Supervisor gone: the child has been reaped
                Ok(Err(_)) => Ok(true),
                Err(_) => Ok(false),
            },
            None => {
                let deadline = tokio::time::Instant::now() + timeout;
                while foreign_process_running(pid) {
                    if tokio::time::Instant::now() >= deadline {
                        return Ok(false);
                    }
                    tokio::time::sleep(FOREIGN_POLL).await;
                }
                Ok(true)
            }
        }
    }

    async fn files_processed(&self, pid: u32) -> Option<u64> {
        self.progress.lock().await.get(&pid).copied()
    }

    async fn forget(&self, pid: u32) {
        self.children.lock().await.remove(&pid);
        self.progress.lock().await.remove(&pid);
    }
}
