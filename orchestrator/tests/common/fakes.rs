//! Hand-written collaborator fakes
//!
//! Each fake is a cheap clone around shared state so a test can keep a
//! handle for inspection after moving one copy into the coordinator.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use orchestrator::{
    BlockKind, Chunk, ChunkStore, Chunker, ChunkingResult, ContentBlock, DirectoryScanner, FileInfo, FileProcessingResult,
    FileProcessor, OrchestratorError, OrchestratorResult, ProcessControl, WorkerLaunch,
};

use super::fixtures::TestFixtures;

/// Scanner reporting `files_per_dir` files for every directory
#[derive(Clone)]
pub struct StaticScanner {
    files_per_dir: usize,
    failing: Arc<Mutex<HashSet<PathBuf>>>,
    scans: Arc<AtomicUsize>,
}

impl StaticScanner {
    pub fn new(files_per_dir: usize) -> Self {
        Self {
            files_per_dir,
            failing: Arc::new(Mutex::new(HashSet::new())),
            scans: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fail_directory(&self, dir: &Path) {
        self.failing.lock().unwrap().insert(dir.to_path_buf());
    }

    pub fn heal_directory(&self, dir: &Path) {
        self.failing.lock().unwrap().remove(dir);
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryScanner for StaticScanner {
    async fn scan(&self, directory: &Path) -> OrchestratorResult<Vec<FileInfo>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(directory) {
            return Err(OrchestratorError::scan(directory, "permission denied"));
        }
        Ok(TestFixtures::files(directory, self.files_per_dir))
    }
}

struct ProcessorState {
    gate: Option<Semaphore>,
    failing: Mutex<HashSet<String>>,
    erroring: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Processor that can hold every call until the test releases it
#[derive(Clone)]
pub struct GatedProcessor {
    state: Arc<ProcessorState>,
}

impl GatedProcessor {
    /// Processes files immediately
    pub fn open() -> Self {
        Self::build(None)
    }

    /// Every file waits for one `release` permit
    pub fn gated() -> Self {
        Self::build(Some(Semaphore::new(0)))
    }

    fn build(gate: Option<Semaphore>) -> Self {
        Self {
            state: Arc::new(ProcessorState {
                gate,
                failing: Mutex::new(HashSet::new()),
                erroring: Mutex::new(HashSet::new()),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Let `files` more calls through the gate
    pub fn release(&self, files: usize) {
        if let Some(gate) = &self.state.gate {
            gate.add_permits(files);
        }
    }

    /// Files with this name come back with `FileStatus::Failed`
    pub fn fail_file(&self, name: &str) {
        self.state.failing.lock().unwrap().insert(name.to_string());
    }

    /// Files with this name return an error
    pub fn error_file(&self, name: &str) {
        self.state.erroring.lock().unwrap().insert(name.to_string());
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileProcessor for GatedProcessor {
    async fn process_file(&self, path: &Path) -> OrchestratorResult<FileProcessingResult> {
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.state.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state.calls.fetch_add(1, Ordering::SeqCst);

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        if self.state.erroring.lock().unwrap().contains(&name) {
            return Err(OrchestratorError::stage("processing", format!("cannot read {name}")));
        }
        if self.state.failing.lock().unwrap().contains(&name) {
            return Ok(FileProcessingResult::failed(path, "unsupported encoding"));
        }
        Ok(FileProcessingResult::success(
            path,
            vec![ContentBlock::new(BlockKind::Paragraph, format!("content of {name}"))],
        ))
    }
}

/// Chunker producing a fixed number of chunks per file
#[derive(Clone, Default)]
pub struct CountingChunker {
    fail: Arc<AtomicBool>,
}

impl CountingChunker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Chunker for CountingChunker {
    async fn create_chunks(&self, result: &FileProcessingResult) -> OrchestratorResult<ChunkingResult> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(OrchestratorError::stage("chunking", "tokenizer unavailable"));
        }
        let chunks: Vec<Chunk> = (0..TestFixtures::CHUNKS_PER_FILE as usize)
            .map(|index| Chunk {
                id: format!("{}#{index}", result.file_path.display()),
                source_path: result.file_path.clone(),
                index,
                text: format!("chunk {index}"),
            })
            .collect();
        Ok(ChunkingResult {
            created: chunks.len() as u64,
            chunks,
            ..Default::default()
        })
    }
}

/// Store recording every accepted batch
#[derive(Clone)]
pub struct RecordingStore {
    accept: Arc<AtomicBool>,
    stored: Arc<Mutex<Vec<(PathBuf, u64)>>>,
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self {
            accept: Arc::new(AtomicBool::new(true)),
            stored: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_accepting(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Vec<(PathBuf, u64)> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChunkStore for RecordingStore {
    async fn store_results(&self, result: &ChunkingResult, directory: &Path) -> OrchestratorResult<bool> {
        if !self.accept.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.stored
            .lock()
            .unwrap()
            .push((directory.to_path_buf(), result.chunks.len() as u64));
        Ok(true)
    }
}

#[derive(Debug, Clone)]
struct FakeProcess {
    running: bool,
    exit_code: Option<i32>,
    files_processed: Option<u64>,
}

#[derive(Default)]
struct ControlState {
    next_pid: u32,
    processes: HashMap<u32, FakeProcess>,
    launches: Vec<WorkerLaunch>,
    terminated: Vec<u32>,
    killed: Vec<u32>,
    forgotten: Vec<u32>,
    refuse_spawn: bool,
    ignore_terminate: bool,
}

/// In-memory stand-in for OS processes
#[derive(Clone, Default)]
pub struct FakeProcessControl {
    state: Arc<Mutex<ControlState>>,
}

impl FakeProcessControl {
    /// First pid handed out
    pub const FIRST_PID: u32 = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_spawn(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_spawn = refuse;
    }

    /// Workers keep running after SIGTERM
    pub fn ignore_terminate(&self, ignore: bool) {
        self.state.lock().unwrap().ignore_terminate = ignore;
    }

    /// The process exits on its own with `code`
    pub fn exit(&self, pid: u32, code: i32) {
        if let Some(process) = self.state.lock().unwrap().processes.get_mut(&pid) {
            process.running = false;
            process.exit_code = Some(code);
        }
    }

    /// The process dies without an exit code
    pub fn crash(&self, pid: u32) {
        if let Some(process) = self.state.lock().unwrap().processes.get_mut(&pid) {
            process.running = false;
            process.exit_code = None;
        }
    }

    pub fn report_progress(&self, pid: u32, files_processed: u64) {
        if let Some(process) = self.state.lock().unwrap().processes.get_mut(&pid) {
            process.files_processed = Some(files_processed);
        }
    }

    pub fn launches(&self) -> Vec<WorkerLaunch> {
        self.state.lock().unwrap().launches.clone()
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.state.lock().unwrap().terminated.clone()
    }

    pub fn killed(&self) -> Vec<u32> {
        self.state.lock().unwrap().killed.clone()
    }

    pub fn forgotten(&self) -> Vec<u32> {
        self.state.lock().unwrap().forgotten.clone()
    }

    pub fn running_pids(&self) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        let mut pids: Vec<u32> = state
            .processes
            .iter()
            .filter(|(_, p)| p.running)
            .map(|(pid, _)| *pid)
            .collect();
        pids.sort_unstable();
        pids
    }
}

#[async_trait]
impl ProcessControl for FakeProcessControl {
    async fn spawn(&self, launch: &WorkerLaunch) -> OrchestratorResult<u32> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_spawn {
            return Err(OrchestratorError::process("spawn refused"));
        }
        let pid = Self::FIRST_PID + state.next_pid;
        state.next_pid += 1;
        state.launches.push(launch.clone());
        state.processes.insert(
            pid,
            FakeProcess {
                running: true,
                exit_code: None,
                files_processed: None,
            },
        );
        Ok(pid)
    }

    async fn is_running(&self, pid: u32) -> bool {
        self.state
            .lock()
            .unwrap()
            .processes
            .get(&pid)
            .is_some_and(|p| p.running)
    }

    async fn exit_code(&self, pid: u32) -> Option<i32> {
        self.state
            .lock()
            .unwrap()
            .processes
            .get(&pid)
            .filter(|p| !p.running)
            .and_then(|p| p.exit_code)
    }

    async fn terminate(&self, pid: u32) -> OrchestratorResult<()> {
        let mut state = self.state.lock().unwrap();
        state.terminated.push(pid);
        let ignore = state.ignore_terminate;
        if let Some(process) = state.processes.get_mut(&pid) {
            if !ignore {
                process.running = false;
            }
        }
        Ok(())
    }

    async fn kill(&self, pid: u32) -> OrchestratorResult<()> {
        let mut state = self.state.lock().unwrap();
        state.killed.push(pid);
        if let Some(process) = state.processes.get_mut(&pid) {
            process.running = false;
            process.exit_code = None;
        }
        Ok(())
    }

    async fn wait(&self, pid: u32, timeout: Duration) -> OrchestratorResult<bool> {
        if self.is_running(pid).await {
            // Honour the timeout so tests can observe the bound
            tokio::time::sleep(timeout.min(Duration::from_millis(50))).await;
        }
        Ok(!self.is_running(pid).await)
    }

    async fn files_processed(&self, pid: u32) -> Option<u64> {
        self.state
            .lock()
            .unwrap()
            .processes
            .get(&pid)
            .and_then(|p| p.files_processed)
    }

    async fn forget(&self, pid: u32) {
        self.state.lock().unwrap().forgotten.push(pid);
    }
}
