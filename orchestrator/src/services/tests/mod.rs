//! Service-specific tests
//!
//! Each filesystem-backed service has its own test file working inside a
//! temporary directory.


// Common test utilities for services
pub mod common {
    use std::path::Path;

    /// Write `content` to `root/relative`, creating parent folders
    pub fn write_file(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}
