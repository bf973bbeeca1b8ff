//! Core types used throughout the ingestion system

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// Global process ID singleton - set once at startup
static PROCESS_ID: OnceLock<ProcessId> = OnceLock::new();

/// Process identifier for any component in the system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// Coordinating process (orchestrator and process manager)
    Orchestrator,
    /// Worker process, numbered by its OS pid
    Worker(u32),
}

impl ProcessId {
    /// Initialize the global process ID for the orchestrator
    pub fn init_orchestrator() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Orchestrator)
    }

    /// Initialize the global process ID for a worker
    pub fn init_worker(id: u32) -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Worker(id))
    }

    /// Get the global process ID
    ///
    /// Falls back to `Orchestrator` when nothing was initialized, which is
    /// the case for library consumers and tests.
    pub fn current() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Orchestrator)
    }

    /// Crate prefix used to build the log filter for this process
    pub fn log_target(&self) -> &'static str {
        match self {
            ProcessId::Orchestrator => "orchestrator",
            ProcessId::Worker(_) => "worker",
        }
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Orchestrator => write!(f, "orchestrator"),
            ProcessId::Worker(id) => write!(f, "worker_{id}"),
        }
    }
}

/// Sanitize a path or name into a single file-name component
///
/// Keeps ASCII alphanumerics, maps separators and whitespace to `_`, drops
/// everything else, and collapses repeated underscores.
pub fn sanitize_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            out.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if (c == '/' || c == '\\' || c == '_' || c.is_whitespace()) && !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    let trimmed = out.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Longest readable prefix kept in a directory key
const MAX_KEY_LABEL: usize = 48;

/// File-name key identifying one directory path
///
/// A readable label from the last path component, then the SHA-256 of the
/// full path bytes. Paths that differ in any byte get different keys.
pub fn directory_key(path: &Path) -> String {
    let label = path
        .file_name()
        .map(|name| sanitize_component(&name.to_string_lossy()))
        .unwrap_or_else(|| "root".to_string());
    let label: String = label.chars().take(MAX_KEY_LABEL).collect();
    let digest = Sha256::digest(path.as_os_str().as_encoded_bytes());
    format!("{label}-{}", hex::encode(digest))
}
