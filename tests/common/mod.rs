//! Common test utilities

#![allow(dead_code)]

use buildtree::log::MemoryLogger;
use buildtree::runner::TaskContext;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory with a buildtree.yml file
pub fn create_test_script(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let script_path = temp_dir.path().join("buildtree.yml");
    fs::write(&script_path, content).unwrap();
    (temp_dir, script_path)
}

/// A context recording into a fresh memory logger
pub fn memory_context() -> (MemoryLogger, TaskContext) {
    let logger = MemoryLogger::new();
    let ctx = TaskContext::with_memory_logger(&logger);
    (logger, ctx)
}
