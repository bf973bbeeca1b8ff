//! Filesystem directory scanner

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use shared::{process_debug, ProcessId};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::DirectoryScanner;
use crate::types::FileInfo;

/// Extensions ingested when no allow-list is configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst"];

/// Files above this size are skipped by default (10 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Scanner backed by `walkdir`
#[derive(Debug, Clone)]
pub struct FsDirectoryScanner {
    extensions: Vec<String>,
    recursive: bool,
    include_hidden: bool,
    max_file_size: u64,
}

impl Default for FsDirectoryScanner {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            recursive: true,
            include_hidden: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl FsDirectoryScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the extension allow-list; an empty list accepts every file
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    fn accepts_extension(&self, info: &FileInfo) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        info.extension
            .as_ref()
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext))
    }

    fn walk(&self, root: &Path) -> OrchestratorResult<Vec<FileInfo>> {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|entry| self.include_hidden || entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                // The root itself is unreadable
                Err(e) if e.depth() == 0 => return Err(OrchestratorError::scan(root, e.to_string())),
                Err(e) => {
                    process_debug!(ProcessId::current(), "Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    process_debug!(ProcessId::current(), "No metadata for {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if size > self.max_file_size {
                process_debug!(ProcessId::current(), "Skipping oversized file {} ({} bytes)", entry.path().display(), size);
                continue;
            }

            let info = FileInfo::new(entry.into_path(), size);
            if self.accepts_extension(&info) {
                files.push(info);
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

#[async_trait]
impl DirectoryScanner for FsDirectoryScanner {
    async fn scan(&self, directory: &Path) -> OrchestratorResult<Vec<FileInfo>> {
        let scanner = self.clone();
        let root: PathBuf = directory.to_path_buf();
        let files = tokio::task::spawn_blocking(move || scanner.walk(&root))
            .await
            .map_err(|e| OrchestratorError::scan(directory, format!("scan task failed: {e}")))??;

        process_debug!(ProcessId::current(), "🔍 Found {} files in {}", files.len(), directory.display());
        Ok(files)
    }
}
