//! Data exchanged with the pipeline collaborators

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file discovered by the directory scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub extension: Option<String>,
}

impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        Self { path, size, extension }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading,
    Paragraph,
    Code,
}

/// A unit of extracted content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub kind: BlockKind,
    pub text: String,
}

impl ContentBlock {
    pub fn new(kind: BlockKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into() }
    }
}

/// Extraction output for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileProcessingResult {
    pub file_path: PathBuf,
    pub status: FileStatus,
    pub blocks: Vec<ContentBlock>,
    pub error: Option<String>,
}

impl FileProcessingResult {
    pub fn success(file_path: impl Into<PathBuf>, blocks: Vec<ContentBlock>) -> Self {
        Self {
            file_path: file_path.into(),
            status: FileStatus::Success,
            blocks,
            error: None,
        }
    }

    pub fn failed(file_path: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            status: FileStatus::Failed,
            blocks: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn skipped(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            status: FileStatus::Skipped,
            blocks: Vec::new(),
            error: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == FileStatus::Failed
    }
}

/// A stored unit of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_path: PathBuf,
    pub index: usize,
    pub text: String,
}

/// Output of chunk creation; also the input of persistence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkingResult {
    pub created: u64,
    pub failed: u64,
    pub errors: Vec<String>,
    pub chunks: Vec<Chunk>,
}

impl ChunkingResult {
    /// Append another result into this one
    pub fn merge(&mut self, other: ChunkingResult) {
        self.created += other.created;
        self.failed += other.failed;
        self.errors.extend(other.errors);
        self.chunks.extend(other.chunks);
    }
}
