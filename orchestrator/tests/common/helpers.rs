//! Test helpers and builder patterns for orchestrator tests
//!
//! This module provides convenient helper functions and builder patterns
//! to reduce test boilerplate and improve maintainability.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use orchestrator::services::InMemoryLockManager;
use orchestrator::traits::MockLockManager;
use orchestrator::*;

use super::fakes::{CountingChunker, FakeProcessControl, GatedProcessor, RecordingStore, StaticScanner};
use super::fixtures::TestFixtures;

/// Type alias for test orchestrator with all fakes
pub type TestOrchestrator = DirectoryOrchestrator<StaticScanner, GatedProcessor, CountingChunker, RecordingStore>;

/// Handles kept by a test after the orchestrator took its collaborators
pub struct OrchestratorHarness {
    pub orchestrator: Arc<TestOrchestrator>,
    pub scanner: StaticScanner,
    pub processor: GatedProcessor,
    pub chunker: CountingChunker,
    pub store: RecordingStore,
    pub locks: Arc<InMemoryLockManager>,
}

/// Builder pattern for creating test orchestrators with sensible defaults
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    files_per_dir: usize,
    processor: GatedProcessor,
    locks: Arc<InMemoryLockManager>,
    lock_manager: Option<Arc<dyn LockManager>>,
}

impl OrchestratorBuilder {
    /// Create a new builder with three files per directory and an open processor
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            files_per_dir: 3,
            processor: GatedProcessor::open(),
            locks: Arc::new(InMemoryLockManager::new()),
            lock_manager: None,
        }
    }

    pub fn with_config<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut OrchestratorConfig),
    {
        setup(&mut self.config);
        self
    }

    pub fn with_files_per_dir(mut self, files: usize) -> Self {
        self.files_per_dir = files;
        self
    }

    /// Hold every file until released through the harness
    pub fn gated(mut self) -> Self {
        self.processor = GatedProcessor::gated();
        self
    }

    /// Share a lock manager with another coordinator
    pub fn with_locks(mut self, locks: Arc<InMemoryLockManager>) -> Self {
        self.locks = locks;
        self
    }

    /// Use an arbitrary lock manager; `OrchestratorHarness::locks` is then unused
    pub fn with_lock_manager(mut self, locks: Arc<dyn LockManager>) -> Self {
        self.lock_manager = Some(locks);
        self
    }

    pub fn build(self) -> OrchestratorHarness {
        let scanner = StaticScanner::new(self.files_per_dir);
        let chunker = CountingChunker::new();
        let store = RecordingStore::new();
        let orchestrator = DirectoryOrchestrator::new(
            self.config,
            scanner.clone(),
            self.processor.clone(),
            chunker.clone(),
            store.clone(),
            self.lock_manager.unwrap_or_else(|| self.locks.clone()),
        )
        .unwrap();

        OrchestratorHarness {
            orchestrator: Arc::new(orchestrator),
            scanner,
            processor: self.processor,
            chunker,
            store,
            locks: self.locks,
        }
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper functions for common test operations
pub struct TestHelpers;

impl TestHelpers {
    /// Manager over a fake process table with short intervals
    pub fn manager(
        setup: impl FnOnce(&mut ChildProcessConfig),
    ) -> (Arc<ChildProcessManager<FakeProcessControl>>, FakeProcessControl, Arc<InMemoryLockManager>) {
        let mut config = ChildProcessConfig {
            health_check_interval: 0.05,
            stop_timeout: Some(0.05),
            ..ChildProcessConfig::default()
        };
        setup(&mut config);

        let control = FakeProcessControl::new();
        let locks = Arc::new(InMemoryLockManager::new());
        let manager = ChildProcessManager::new(config, control.clone(), locks.clone()).unwrap();
        (Arc::new(manager), control, locks)
    }

    /// Lock manager that grants every lock but fails every release
    pub fn unreleasable_locks() -> MockLockManager {
        let mut locks = MockLockManager::new();
        locks.expect_acquire_lock().returning(|_| Ok(()));
        locks.expect_is_locked().returning(|_| true);
        locks
            .expect_release_lock()
            .returning(|path| Err(OrchestratorError::lock(path, "lock file is read-only")));
        locks
    }

    /// Poll a synchronous condition until it holds or the wait limit passes
    pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Self::deadline();
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    /// Wait until `dir` is active in `stage`
    pub async fn wait_for_stage(orchestrator: &TestOrchestrator, dir: &Path, stage: ProcessingStage) -> bool {
        let deadline = Self::deadline();
        while tokio::time::Instant::now() < deadline {
            if orchestrator
                .get_processing_status(dir)
                .await
                .is_some_and(|status| status.status == stage)
            {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    /// Wait until exactly `count` directories are active
    pub async fn wait_for_active(orchestrator: &TestOrchestrator, count: usize) -> bool {
        let deadline = Self::deadline();
        while tokio::time::Instant::now() < deadline {
            if orchestrator.active_count().await == count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    /// Wait until the manager tracks exactly `count` workers
    pub async fn wait_for_workers(manager: &ChildProcessManager<FakeProcessControl>, count: usize) -> bool {
        let deadline = Self::deadline();
        while tokio::time::Instant::now() < deadline {
            if manager.worker_count().await == count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    fn deadline() -> tokio::time::Instant {
        tokio::time::Instant::now() + Duration::from_millis(TestFixtures::WAIT_LIMIT_MS)
    }

    /// Assert a result is terminal and its status history only moves forward
    pub fn assert_terminal(result: &OrchestrationResult) {
        let last = result.final_status().expect("result should carry status updates");
        assert!(last.is_terminal(), "final status {last} is not terminal");
        for pair in result.status_updates.windows(2) {
            assert!(
                pair[0].status == pair[1].status || pair[0].status.can_transition_to(pair[1].status),
                "illegal transition {} -> {}",
                pair[0].status,
                pair[1].status
            );
        }
    }
}
