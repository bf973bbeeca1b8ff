//! Block packing into bounded chunks

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::OrchestratorResult;
use crate::traits::Chunker;
use crate::types::{Chunk, ChunkingResult, FileProcessingResult, FileStatus};

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 2000;

/// Packs consecutive content blocks into chunks of at most `max_chars`
/// characters. A single block longer than the limit is split on character
/// boundaries.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    max_chars: usize,
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_CHARS)
    }
}

impl ParagraphChunker {
    /// `max_chars` of zero is treated as one
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Chunk texts for a list of block texts
    pub fn pack<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for text in texts {
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let len = text.chars().count();

            if len > self.max_chars {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let chars: Vec<char> = text.chars().collect();
                chunks.extend(chars.chunks(self.max_chars).map(|piece| piece.iter().collect::<String>()));
                continue;
            }

            // Blocks are joined with a blank line
            let joined_len = if current.is_empty() { len } else { current_len + 2 + len };
            if joined_len > self.max_chars {
                chunks.push(std::mem::take(&mut current));
                current.push_str(text);
                current_len = len;
            } else {
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(text);
                current_len = joined_len;
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

#[async_trait]
impl Chunker for ParagraphChunker {
    async fn create_chunks(&self, result: &FileProcessingResult) -> OrchestratorResult<ChunkingResult> {
        if result.status != FileStatus::Success {
            return Ok(ChunkingResult::default());
        }

        let chunks: Vec<Chunk> = self
            .pack(result.blocks.iter().map(|b| b.text.as_str()))
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                id: Uuid::new_v4().to_string(),
                source_path: result.file_path.clone(),
                index,
                text,
            })
            .collect();

        Ok(ChunkingResult {
            created: chunks.len() as u64,
            failed: 0,
            errors: Vec::new(),
            chunks,
        })
    }
}
