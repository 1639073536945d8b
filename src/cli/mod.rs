//! CLI interface and argument parsing
//!
//! This module handles command-line parsing and drives a build run.

pub mod app;

// Re-export main types
pub use app::*;
