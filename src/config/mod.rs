//! Build script parsing and validation
//!
//! This module handles parsing of buildtree.yml scripts, validation of their
//! structure, and conversion into a target tree.

pub mod build;
pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use build::*;
pub use parse::*;
pub use schema::*;
pub use types::*;
