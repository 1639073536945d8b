//! Loading configuration files into context properties
//!
//! A YAML document is flattened into `/`-separated keys that follow the
//! structure of the file:
//!
//! ```yaml
//! database:
//!   host: localhost
//! servers:
//!   - web01
//! ```
//!
//! becomes `database/host = localhost` and `servers/0 = web01`.

use crate::error::{ConfigError, ExecutionError, Result};
use crate::runner::{Task, TaskContext};
use serde_yaml::Value;
use std::fs;
use std::path::PathBuf;

/// Separator between key segments
pub const KEY_SEPARATOR: char = '/';

/// Reads a YAML configuration file into the context's properties
#[derive(Debug, Clone)]
pub struct ReadConfigurationTask {
    file: PathBuf,
    prefix: Option<String>,
    optional: bool,
    keys_read: usize,
}

impl ReadConfigurationTask {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        ReadConfigurationTask {
            file: file.into(),
            prefix: None,
            optional: false,
            keys_read: 0,
        }
    }

    /// Put every key under `prefix/`
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Don't fail when the file does not exist
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Number of properties written by the last run
    pub fn keys_read(&self) -> usize {
        self.keys_read
    }
}

impl Task for ReadConfigurationTask {
    fn description(&self) -> String {
        format!("Read configuration from '{}'", self.file.display())
    }

    fn is_safe_to_execute_in_dry_run(&self) -> bool {
        true
    }

    fn do_execute(&mut self, ctx: &mut TaskContext) -> Result<()> {
        let path = ctx.resolve_path(&self.file);
        if !path.is_file() {
            if self.optional {
                ctx.write_warn(&format!("'{}' not found, skipping", path.display()));
                self.keys_read = 0;
                return Ok(());
            }
            return Err(ExecutionError::Failed(format!(
                "Configuration file '{}' does not exist",
                path.display()
            ))
            .into());
        }

        let contents = fs::read_to_string(&path)?;
        let document: Value = serde_yaml::from_str(&contents)?;
        let entries = flatten_document(&document, self.prefix.as_deref().unwrap_or(""))?;

        self.keys_read = entries.len();
        for (key, value) in entries {
            ctx.write_debug(&format!("{} = {}", key, value));
            ctx.properties_mut().set(key, value);
        }
        Ok(())
    }
}

/// Flatten a YAML document into `(key, value)` pairs
pub fn flatten_document(document: &Value, prefix: &str) -> Result<Vec<(String, String)>> {
    match document {
        Value::Mapping(_) | Value::Sequence(_) => {
            let mut entries = Vec::new();
            flatten_into(document, prefix.to_string(), &mut entries)?;
            Ok(entries)
        }
        Value::Null => Ok(Vec::new()),
        Value::Tagged(tagged) => flatten_document(&tagged.value, prefix),
        _ => Err(ConfigError::Invalid(
            "Configuration document must be a mapping or a sequence".to_string(),
        )
        .into()),
    }
}

fn flatten_into(value: &Value, path: String, out: &mut Vec<(String, String)>) -> Result<()> {
    match value {
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                let segment = scalar_to_string(key).ok_or_else(|| {
                    ConfigError::Invalid(format!("Unsupported key under '{}'", path))
                })?;
                flatten_into(child, join_key(&path, &segment), out)?;
            }
        }
        Value::Sequence(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, join_key(&path, &index.to_string()), out)?;
            }
        }
        Value::Tagged(tagged) => flatten_into(&tagged.value, path, out)?,
        scalar => out.push((path, scalar_to_string(scalar).unwrap_or_default())),
    }
    Ok(())
}

/// Text of a scalar YAML value; `None` for mappings and sequences
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn join_key(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{}{}{}", parent, KEY_SEPARATOR, segment)
    }
}
