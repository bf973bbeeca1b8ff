//! JSON lines chunk store
//!
//! Each ingested directory gets its own folder under the base directory
//! holding an append-only `chunks.jsonl` and a `metadata.json` with the
//! running totals.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use shared::{directory_key, process_debug, ProcessId};

use crate::error::OrchestratorResult;
use crate::traits::ChunkStore;
use crate::types::{Chunk, ChunkingResult};

/// Contents of `metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub directory: String,
    pub created_at: String,
    pub updated_at: String,
    pub total_chunks: u64,
}

/// One line of `chunks.jsonl`
#[derive(Debug, Serialize)]
struct ChunkRecord<'a> {
    #[serde(flatten)]
    chunk: &'a Chunk,
    stored_at: &'a str,
}

pub struct JsonlChunkStore {
    base_dir: PathBuf,
}

impl JsonlChunkStore {
    /// Store under ./output
    pub fn new() -> Self {
        Self::with_base_dir("./output")
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Folder holding the chunks of `directory`
    pub fn directory_path(&self, directory: &Path) -> PathBuf {
        self.base_dir.join(directory_key(directory))
    }

    pub fn chunks_file_path(&self, directory: &Path) -> PathBuf {
        self.directory_path(directory).join("chunks.jsonl")
    }

    pub fn metadata_file_path(&self, directory: &Path) -> PathBuf {
        self.directory_path(directory).join("metadata.json")
    }

    /// Read back the stored chunk texts of a directory
    pub async fn read_chunks(&self, directory: &Path) -> OrchestratorResult<Vec<Chunk>> {
        let path = self.chunks_file_path(directory);
        if fs::metadata(&path).await.is_err() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).await?;
        let mut chunks = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            chunks.push(serde_json::from_str(line)?);
        }
        Ok(chunks)
    }

    pub async fn read_metadata(&self, directory: &Path) -> OrchestratorResult<Option<StoreMetadata>> {
        let path = self.metadata_file_path(directory);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_metadata(&self, directory: &Path, added: u64) -> OrchestratorResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let metadata = match self.read_metadata(directory).await? {
            Some(mut existing) => {
                existing.total_chunks += added;
                existing.updated_at = now;
                existing
            }
            None => StoreMetadata {
                directory: directory.display().to_string(),
                created_at: now.clone(),
                updated_at: now,
                total_chunks: added,
            },
        };

        // Write-then-rename so readers never see a partial file
        let path = self.metadata_file_path(directory);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&metadata)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

impl Default for JsonlChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkStore for JsonlChunkStore {
    async fn store_results(&self, result: &ChunkingResult, directory: &Path) -> OrchestratorResult<bool> {
        fs::create_dir_all(self.directory_path(directory)).await?;

        if !result.chunks.is_empty() {
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.chunks_file_path(directory))
                .await?;

            let stored_at = chrono::Utc::now().to_rfc3339();
            let mut buffer = String::new();
            for chunk in &result.chunks {
                let record = ChunkRecord {
                    chunk,
                    stored_at: &stored_at,
                };
                buffer.push_str(&serde_json::to_string(&record)?);
                buffer.push('\n');
            }
            file.write_all(buffer.as_bytes()).await?;
            file.flush().await?;
        }

        self.update_metadata(directory, result.chunks.len() as u64).await?;

        process_debug!(
            ProcessId::current(),
            "💾 Stored {} chunks for {}",
            result.chunks.len(),
            directory.display()
        );
        Ok(true)
    }
}
