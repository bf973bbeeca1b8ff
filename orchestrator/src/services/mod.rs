//! Service implementations
//!
//! This module contains real implementations of all collaborator traits.
//! These are the production implementations that handle actual I/O operations.

pub mod chunk_store;
pub mod chunker;
pub mod file_scanner;
pub mod lock_manager;
pub mod process_control;
pub mod text_processor;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use chunk_store::JsonlChunkStore;
pub use chunker::ParagraphChunker;
pub use file_scanner::FsDirectoryScanner;
pub use lock_manager::{FileLockManager, InMemoryLockManager};
pub use process_control::RealProcessControl;
pub use text_processor::TextFileProcessor;
