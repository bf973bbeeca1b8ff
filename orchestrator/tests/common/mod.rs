//! Common test utilities and infrastructure
//!
//! This module provides shared test utilities, fixtures, and fakes
//! used across all orchestrator test suites.

#![allow(dead_code, unused_imports)]

pub mod fakes;
pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fakes::{CountingChunker, FakeProcessControl, GatedProcessor, RecordingStore, StaticScanner};
pub use fixtures::TestFixtures;
pub use helpers::{OrchestratorBuilder, TestHelpers, TestOrchestrator};
