//! Test fixtures and data for orchestrator tests
//!
//! This module provides consistent test data and fixtures used across all test suites.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use orchestrator::FileInfo;

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Chunks produced per successful file by `CountingChunker`
    pub const CHUNKS_PER_FILE: u64 = 2;

    /// Upper bound for any wait in the tests
    pub const WAIT_LIMIT_MS: u64 = 2000;

    /// A fresh temporary directory that exists on disk
    pub fn directory() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    /// `count` existing directories under one temporary root
    pub fn directories(count: usize) -> (TempDir, Vec<PathBuf>) {
        let root = tempfile::tempdir().unwrap();
        let dirs = (0..count)
            .map(|i| {
                let dir = root.path().join(format!("dir_{i}"));
                std::fs::create_dir(&dir).unwrap();
                dir
            })
            .collect();
        (root, dirs)
    }

    /// File infos named `file_<n>.txt` inside `dir`
    pub fn files(dir: &Path, count: usize) -> Vec<FileInfo> {
        (0..count)
            .map(|i| FileInfo::new(dir.join(format!("file_{i}.txt")), 10))
            .collect()
    }

    /// Sample documents for end-to-end tests with real services
    pub fn write_documents(dir: &Path) {
        std::fs::write(
            dir.join("guide.md"),
            "# Guide\n\nInstall the tool.\n\n```sh\nmake install\n```\n\n## Usage\n\nRun it.\n",
        )
        .unwrap();
        std::fs::write(dir.join("notes.txt"), "first paragraph\n\nsecond paragraph\n").unwrap();
        std::fs::write(dir.join("empty.txt"), "").unwrap();
        std::fs::write(dir.join("picture.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();
    }
}
