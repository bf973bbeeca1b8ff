//! Shared types for the directory ingestion system
//!
//! Contains only what both sides of the process boundary need: process
//! identity, logging, and the report lines a worker writes to its parent.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod types;

pub use errors::*;
pub use messages::{WorkerExitCode, WorkerReport};
pub use types::*;
