//! Build script validation
//!
//! Catches configuration errors before any target runs.

use crate::config::types::{BuildScript, Step, TargetConfig};
use crate::error::{ConfigError, ConfigResult};
use crate::runner::HELP_TARGET;
use std::collections::HashSet;

/// Validate a complete build script
pub fn validate_script(script: &BuildScript) -> ConfigResult<()> {
    if let Some(interpreter) = &script.interpreter {
        if interpreter.is_empty() {
            return Err(ConfigError::Invalid(
                "interpreter must name at least a program".to_string(),
            ));
        }
    }

    for (name, target) in &script.targets {
        validate_target(script, name, target)?;
    }

    if let Some(default) = &script.default {
        if !is_known_target(script, default) {
            return Err(ConfigError::TargetNotFound(default.clone()));
        }
    }

    detect_circular_dependencies(script)?;

    Ok(())
}

/// Validate a single target
pub fn validate_target(script: &BuildScript, name: &str, target: &TargetConfig) -> ConfigResult<()> {
    if name.trim().is_empty() {
        return Err(ConfigError::Invalid("target names cannot be empty".to_string()));
    }
    if name == HELP_TARGET {
        return Err(ConfigError::DuplicateTarget(name.to_string()));
    }

    for dependency in &target.depends_on {
        if !is_known_target(script, dependency) {
            return Err(ConfigError::Invalid(format!(
                "Target '{}' depends on undefined target '{}'",
                name, dependency
            )));
        }
    }

    for step in &target.steps {
        validate_step(step)?;
    }

    Ok(())
}

fn validate_step(step: &Step) -> ConfigResult<()> {
    match step {
        Step::Shell(command) if command.trim().is_empty() => {
            Err(ConfigError::MissingParameter("command".to_string()))
        }
        Step::Program(program) if program.run.trim().is_empty() => {
            Err(ConfigError::MissingParameter("run".to_string()))
        }
        Step::Program(program) if program.timeout == Some(0) => Err(ConfigError::Invalid(
            format!("timeout for '{}' must be at least one second", program.run),
        )),
        _ => Ok(()),
    }
}

fn is_known_target(script: &BuildScript, name: &str) -> bool {
    name == HELP_TARGET || script.targets.contains_key(name)
}

/// Detect circular dependencies between targets
fn detect_circular_dependencies(script: &BuildScript) -> ConfigResult<()> {
    let mut names: Vec<&String> = script.targets.keys().collect();
    names.sort();

    let mut visited = HashSet::new();
    for name in names {
        let mut stack = Vec::new();
        check_target_cycle(script, name, &mut visited, &mut stack)?;
    }
    Ok(())
}

/// Recursively check for cycles in target dependencies
fn check_target_cycle(
    script: &BuildScript,
    name: &str,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
) -> ConfigResult<()> {
    // Check if we've found a cycle
    if stack.iter().any(|s| s == name) {
        stack.push(name.to_string());
        return Err(ConfigError::CircularDependency(stack.join(" -> ")));
    }

    // Skip if already fully processed
    if visited.contains(name) {
        return Ok(());
    }

    // `help` has no dependencies
    let Some(target) = script.targets.get(name) else {
        return Ok(());
    };

    stack.push(name.to_string());
    for dependency in &target.depends_on {
        check_target_cycle(script, dependency, visited, stack)?;
    }
    stack.pop();
    visited.insert(name.to_string());

    Ok(())
}
