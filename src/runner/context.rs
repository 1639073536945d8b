//! Execution context for targets and tasks
//!
//! The context carries the build-wide state every target and task sees:
//! properties, the log sink, the nesting depth and the dry-run flag.

use crate::error::{ConfigError, ConfigResult};
use crate::log::{LogLevel, Logger, MemoryLogger};
use std::collections::hash_map;
use std::collections::HashMap;
use std::env;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// Build-wide string properties. Last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, returning the previous value if there was one
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a property that a task cannot do without
    pub fn get_required(&self, key: &str) -> ConfigResult<&str> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingParameter(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, String> {
        self.values.iter()
    }

    /// Borrow the raw map, e.g. for interpolation
    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.values
    }
}

impl Extend<(String, String)> for Properties {
    fn extend<I: IntoIterator<Item = (String, String)>>(&mut self, iter: I) {
        self.values.extend(iter);
    }
}

impl FromIterator<(String, String)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Properties {
            values: iter.into_iter().collect(),
        }
    }
}

/// Execution context shared by every target and task in a build run
pub struct TaskContext {
    /// Build-wide properties
    properties: Properties,

    /// Where messages go
    logger: Box<dyn Logger>,

    /// Current nesting depth, used to indent output
    depth: usize,

    /// Skip side effects of tasks that are not safe to run in dry-run mode
    dry_run: bool,

    /// Base directory for relative paths
    working_dir: PathBuf,
}

impl TaskContext {
    /// Create a new context writing to the given logger
    pub fn new(logger: Box<dyn Logger>) -> Self {
        TaskContext {
            properties: Properties::new(),
            logger,
            depth: 0,
            dry_run: false,
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Create a context that records messages into `logger`
    pub fn with_memory_logger(logger: &MemoryLogger) -> Self {
        Self::new(Box::new(logger.clone()))
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    /// Seed properties
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Resolve a path against the working directory
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.working_dir.join(path)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn increase_depth(&mut self) {
        self.depth += 1;
    }

    pub fn decrease_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Increase the depth for the lifetime of the returned guard
    pub fn nested(&mut self) -> DepthGuard<'_> {
        self.increase_depth();
        DepthGuard { ctx: self }
    }

    /// Write a message at the current depth
    pub fn write_message(&mut self, level: LogLevel, message: &str) {
        self.logger.write_message(level, self.depth, message);
    }

    pub fn write_debug(&mut self, message: &str) {
        self.write_message(LogLevel::Debug, message);
    }

    pub fn write_info(&mut self, message: &str) {
        self.write_message(LogLevel::Info, message);
    }

    pub fn write_warn(&mut self, message: &str) {
        self.write_message(LogLevel::Warn, message);
    }

    pub fn write_error(&mut self, message: &str) {
        self.write_message(LogLevel::Error, message);
    }
}

/// Holds one level of context depth; dropping it restores the previous depth
pub struct DepthGuard<'a> {
    ctx: &'a mut TaskContext,
}

impl Deref for DepthGuard<'_> {
    type Target = TaskContext;

    fn deref(&self) -> &TaskContext {
        self.ctx
    }
}

impl DerefMut for DepthGuard<'_> {
    fn deref_mut(&mut self) -> &mut TaskContext {
        self.ctx
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.ctx.decrease_depth();
    }
}
