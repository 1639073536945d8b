//! buildtree - target-based build automation
//!
//! A build script declares targets with dependencies; running a target runs
//! its dependencies first, each exactly once, then its own action. Actions
//! are made of tasks that share a [`runner::TaskContext`] and start external
//! programs through a [`runner::ProcessRunner`].

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod log;
pub mod runner;

// Re-export commonly used types
pub use error::{BuildError, Result};

/// Current version of buildtree
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
