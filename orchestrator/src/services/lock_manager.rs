//! Directory lock implementations
//!
//! `FileLockManager` keeps one lock file per directory so that separate
//! processes (the orchestrator binary and spawned workers) agree on
//! ownership. `InMemoryLockManager` covers the single-process case.

use async_trait::async_trait;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use shared::{directory_key, process_debug, process_warn, ProcessId};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::LockManager;

/// Lock files under `<lock_dir>/<directory key>.lock`
pub struct FileLockManager {
    lock_dir: PathBuf,
}

impl FileLockManager {
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: lock_dir.into(),
        }
    }

    /// Lock file path for a directory
    pub fn lock_path(&self, directory: &Path) -> PathBuf {
        self.lock_dir.join(format!("{}.lock", directory_key(directory)))
    }

    /// Record the owner in a freshly created lock file
    ///
    /// A failed write removes the lock file again, so the directory is
    /// never left locked with no holder.
    pub(crate) async fn write_owner<W>(lock_path: &Path, directory: &Path, mut out: W) -> OrchestratorResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let owner = serde_json::json!({
            "directory": directory.display().to_string(),
            "owner": ProcessId::current().to_string(),
            "pid": std::process::id(),
            "acquired_at": chrono::Utc::now().to_rfc3339(),
        });
        let written = match out.write_all(owner.to_string().as_bytes()).await {
            Ok(()) => out.flush().await,
            Err(e) => Err(e),
        };
        drop(out);
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(lock_path).await {
                process_warn!(
                    ProcessId::current(),
                    "⚠️ Could not remove lock file {}: {}",
                    lock_path.display(),
                    cleanup
                );
            }
            return Err(OrchestratorError::lock(directory, e.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LockManager for FileLockManager {
    async fn acquire_lock(&self, directory: &Path) -> OrchestratorResult<()> {
        fs::create_dir_all(&self.lock_dir)
            .await
            .map_err(|e| OrchestratorError::lock(directory, e.to_string()))?;

        let path = self.lock_path(directory);
        let file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(OrchestratorError::DirectoryLocked {
                    path: directory.to_path_buf(),
                });
            }
            Err(e) => return Err(OrchestratorError::lock(directory, e.to_string())),
        };

        Self::write_owner(&path, directory, file).await?;
        process_debug!(ProcessId::current(), "🔒 Locked {}", directory.display());
        Ok(())
    }

    async fn release_lock(&self, directory: &Path) -> OrchestratorResult<()> {
        match fs::remove_file(self.lock_path(directory)).await {
            Ok(()) => {
                process_debug!(ProcessId::current(), "🔓 Released {}", directory.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OrchestratorError::lock(directory, e.to_string())),
        }
    }

    async fn is_locked(&self, directory: &Path) -> bool {
        fs::metadata(self.lock_path(directory)).await.is_ok()
    }
}

/// Process-local locks
#[derive(Default)]
pub struct InMemoryLockManager {
    held: Mutex<HashSet<PathBuf>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn held_count(&self) -> usize {
        self.held.lock().await.len()
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire_lock(&self, directory: &Path) -> OrchestratorResult<()> {
        if self.held.lock().await.insert(directory.to_path_buf()) {
            Ok(())
        } else {
            Err(OrchestratorError::DirectoryLocked {
                path: directory.to_path_buf(),
            })
        }
    }

    async fn release_lock(&self, directory: &Path) -> OrchestratorResult<()> {
        self.held.lock().await.remove(directory);
        Ok(())
    }

    async fn is_locked(&self, directory: &Path) -> bool {
        self.held.lock().await.contains(directory)
    }
}
