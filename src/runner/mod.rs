//! Target and task execution engine
//!
//! This module holds the target dependency tree, the task contract every
//! unit of work follows, and the process runner tasks use to start programs.

pub mod context;
pub mod interpolate;
pub mod process;
pub mod program;
pub mod read_config;
pub mod target;
pub mod task;
pub mod tree;

// Re-export main types
pub use context::*;
pub use interpolate::*;
pub use process::*;
pub use program::*;
pub use read_config::*;
pub use target::*;
pub use task::*;
pub use tree::*;
