//! Plain text and Markdown content extraction

use async_trait::async_trait;
use std::path::Path;

use crate::error::OrchestratorResult;
use crate::traits::FileProcessor;
use crate::types::{BlockKind, ContentBlock, FileProcessingResult};

/// Reads UTF-8 files and splits them into content blocks
#[derive(Debug, Clone, Default)]
pub struct TextFileProcessor;

impl TextFileProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Split text into blocks according to the file's extension
    pub fn extract_blocks(path: &Path, text: &str) -> Vec<ContentBlock> {
        let is_markdown = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"));

        if is_markdown {
            split_markdown(text)
        } else {
            split_paragraphs(text)
        }
    }
}

#[async_trait]
impl FileProcessor for TextFileProcessor {
    async fn process_file(&self, path: &Path) -> OrchestratorResult<FileProcessingResult> {
        let bytes = tokio::fs::read(path).await?;

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                return Ok(FileProcessingResult::failed(
                    path,
                    format!("not valid UTF-8: {}", e.utf8_error()),
                ));
            }
        };

        let blocks = Self::extract_blocks(path, &text);
        if blocks.is_empty() {
            return Ok(FileProcessingResult::skipped(path));
        }
        Ok(FileProcessingResult::success(path, blocks))
    }
}

fn split_paragraphs(text: &str) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush_paragraph(&mut current, &mut blocks);
        } else {
            current.push(line.trim_end());
        }
    }
    flush_paragraph(&mut current, &mut blocks);
    blocks
}

fn flush_paragraph(lines: &mut Vec<&str>, blocks: &mut Vec<ContentBlock>) {
    if !lines.is_empty() {
        blocks.push(ContentBlock::new(BlockKind::Paragraph, lines.join("\n")));
        lines.clear();
    }
}

fn split_markdown(text: &str) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut code: Option<Vec<&str>> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();

        if let Some(fence) = code.as_mut() {
            if trimmed.starts_with("```") {
                let body = fence.join("\n");
                if !body.trim().is_empty() {
                    blocks.push(ContentBlock::new(BlockKind::Code, body));
                }
                code = None;
            } else {
                fence.push(line);
            }
            continue;
        }

        if trimmed.starts_with("```") {
            flush_paragraph(&mut paragraph, &mut blocks);
            code = Some(Vec::new());
        } else if is_heading(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let title = trimmed.trim_start_matches('#').trim();
            if !title.is_empty() {
                blocks.push(ContentBlock::new(BlockKind::Heading, title));
            }
        } else if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
        } else {
            paragraph.push(line.trim_end());
        }
    }

    // Unterminated fence: keep what was collected
    if let Some(fence) = code {
        let body = fence.join("\n");
        if !body.trim().is_empty() {
            blocks.push(ContentBlock::new(BlockKind::Code, body));
        }
    }
    flush_paragraph(&mut paragraph, &mut blocks);
    blocks
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].chars().next().map_or(true, char::is_whitespace)
}
