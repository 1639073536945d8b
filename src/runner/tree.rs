//! Target dependency resolution and execution
//!
//! The tree owns every target of a build run. Running a target first runs its
//! dependencies depth-first in declaration order, skipping anything that has
//! already executed in this tree, then runs the target itself.

use crate::error::{ConfigError, ConfigResult, Result};
use crate::runner::{Target, TargetBuilder, Task, TaskContext};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Name of the built-in target listing all visible targets
pub const HELP_TARGET: &str = "help";

/// Owns the targets of a build run and tracks which have executed
pub struct TargetTree {
    targets: HashMap<String, Target>,
    executed: HashSet<String>,
    default_target: Option<String>,
}

impl TargetTree {
    /// Create a tree containing only the `help` target
    pub fn new() -> Self {
        let mut help = Target::new(HELP_TARGET.to_string());
        help.set_description("Displays the available targets")
            .set_dry_run_safe(true);

        let mut targets = HashMap::new();
        targets.insert(HELP_TARGET.to_string(), help);

        TargetTree {
            targets,
            executed: HashSet::new(),
            default_target: None,
        }
    }

    /// Register a new target. Names are unique and case-sensitive.
    pub fn add_target(&mut self, name: impl Into<String>) -> ConfigResult<TargetBuilder<'_>> {
        match self.targets.entry(name.into()) {
            Entry::Occupied(entry) => Err(ConfigError::DuplicateTarget(entry.key().clone())),
            Entry::Vacant(entry) => {
                let name = entry.key().clone();
                let target = entry.insert(Target::new(name));
                Ok(TargetBuilder::new(target, &mut self.default_target))
            }
        }
    }

    pub fn get_target(&self, name: &str) -> ConfigResult<&Target> {
        self.targets
            .get(name)
            .ok_or_else(|| ConfigError::TargetNotFound(name.to_string()))
    }

    pub fn get_target_mut(&mut self, name: &str) -> ConfigResult<&mut Target> {
        self.targets
            .get_mut(name)
            .ok_or_else(|| ConfigError::TargetNotFound(name.to_string()))
    }

    pub fn has_target(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    /// All target names, sorted
    pub fn target_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.targets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn set_default_target(&mut self, name: &str) -> ConfigResult<()> {
        self.get_target(name)?;
        self.default_target = Some(name.to_string());
        Ok(())
    }

    pub fn default_target(&self) -> Option<&Target> {
        self.default_target
            .as_deref()
            .and_then(|name| self.targets.get(name))
    }

    pub fn is_executed(&self, name: &str) -> bool {
        self.executed.contains(name)
    }

    /// Names of the targets executed so far, sorted
    pub fn executed_targets(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.executed.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// One line per visible target, sorted by name: the name padded to the
    /// longest name, followed by the description
    pub fn help_lines(&self) -> Vec<String> {
        let mut visible: Vec<&Target> = self.targets.values().filter(|t| !t.is_hidden()).collect();
        visible.sort_by(|a, b| a.name().cmp(b.name()));

        let width = visible.iter().map(|t| t.name().len()).max().unwrap_or(0);
        visible
            .iter()
            .map(|t| {
                format!("{:<width$}  {}", t.name(), t.summary().unwrap_or(""), width = width)
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    /// Run a target after its dependencies. A target that already executed in
    /// this tree is skipped.
    pub fn run_target(&mut self, ctx: &mut TaskContext, name: &str) -> Result<()> {
        let mut in_progress = Vec::new();
        self.run_with_stack(ctx, name, &mut in_progress)
    }

    /// Run the default target, or `help` when there is none
    pub fn run_default(&mut self, ctx: &mut TaskContext) -> Result<()> {
        let name = self
            .default_target
            .clone()
            .unwrap_or_else(|| HELP_TARGET.to_string());
        self.run_target(ctx, &name)
    }

    /// Run every dependency of `name` that has not executed yet, without
    /// running `name` itself
    pub fn ensure_dependencies_executed(&mut self, ctx: &mut TaskContext, name: &str) -> Result<()> {
        self.get_target(name)?;
        let mut in_progress = vec![name.to_string()];
        self.run_dependencies(ctx, name, &mut in_progress)
    }

    fn run_with_stack(
        &mut self,
        ctx: &mut TaskContext,
        name: &str,
        in_progress: &mut Vec<String>,
    ) -> Result<()> {
        if !self.targets.contains_key(name) {
            return Err(ConfigError::TargetNotFound(name.to_string()).into());
        }
        if in_progress.iter().any(|t| t == name) {
            let mut path = in_progress.clone();
            path.push(name.to_string());
            return Err(ConfigError::CircularDependency(path.join(" -> ")).into());
        }
        if self.executed.contains(name) {
            ctx.write_debug(&format!("Target '{}' already executed, skipping", name));
            return Ok(());
        }

        in_progress.push(name.to_string());
        self.run_dependencies(ctx, name, in_progress)?;
        in_progress.pop();

        self.executed.insert(name.to_string());
        if name == HELP_TARGET {
            self.prepare_help();
        }

        debug!(name, "executing target");
        self.get_target_mut(name)?.execute(ctx)
    }

    fn run_dependencies(
        &mut self,
        ctx: &mut TaskContext,
        name: &str,
        in_progress: &mut Vec<String>,
    ) -> Result<()> {
        let dependencies = self.get_target(name)?.dependencies().to_vec();
        debug!(name, ?dependencies, "resolving dependencies");

        for dependency in &dependencies {
            if self.executed.contains(dependency) {
                continue;
            }
            self.run_with_stack(ctx, dependency, in_progress)?;
        }
        Ok(())
    }

    /// Install the listing action on `help` unless a build script replaced it
    fn prepare_help(&mut self) {
        let lines = self.help_lines();
        if let Some(help) = self.targets.get_mut(HELP_TARGET) {
            if help.accepts_generated_action() {
                help.install_generated_action(move |ctx: &mut TaskContext| {
                    for line in &lines {
                        ctx.write_info(line);
                    }
                    Ok(())
                });
            }
        }
    }
}

impl Default for TargetTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::log::MemoryLogger;

    #[test]
    fn test_new_tree_has_help_only() {
        let tree = TargetTree::new();
        assert_eq!(tree.target_names(), vec!["help"]);
        assert!(tree.default_target().is_none());
    }

    #[test]
    fn test_add_duplicate_target_fails() {
        let mut tree = TargetTree::new();
        tree.add_target("compile").unwrap();
        let err = tree.add_target("compile").err().unwrap();
        assert!(matches!(err, ConfigError::DuplicateTarget(ref n) if n == "compile"));

        assert!(tree.add_target("help").is_err());
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut tree = TargetTree::new();
        tree.add_target("Compile").unwrap();
        tree.add_target("compile").unwrap();
        assert!(tree.has_target("Compile"));
        assert!(tree.has_target("compile"));
        assert!(!tree.has_target("COMPILE"));
    }

    #[test]
    fn test_get_unknown_target_names_it() {
        let tree = TargetTree::new();
        let err = tree.get_target("deploy").unwrap_err();
        assert!(err.to_string().contains("deploy"));
    }

    #[test]
    fn test_set_default_target_requires_existing_target() {
        let mut tree = TargetTree::new();
        assert!(tree.set_default_target("build").is_err());

        tree.add_target("build").unwrap();
        tree.set_default_target("build").unwrap();
        assert_eq!(tree.default_target().map(Target::name), Some("build"));
    }

    #[test]
    fn test_builder_set_as_default() {
        let mut tree = TargetTree::new();
        tree.add_target("build").unwrap().set_as_default();
        assert_eq!(tree.default_target().map(Target::name), Some("build"));
    }

    #[test]
    fn test_help_lines_sorted_and_aligned() {
        let mut tree = TargetTree::new();
        tree.add_target("compile")
            .unwrap()
            .set_description("Compile sources");
        tree.add_target("a").unwrap().set_description("First");
        tree.add_target("secret").unwrap().set_as_hidden();

        assert_eq!(
            tree.help_lines(),
            vec![
                "a        First",
                "compile  Compile sources",
                "help     Displays the available targets",
            ]
        );
    }

    #[test]
    fn test_run_unknown_target() {
        let logger = MemoryLogger::new();
        let mut ctx = TaskContext::with_memory_logger(&logger);
        let mut tree = TargetTree::new();

        let err = tree.run_target(&mut ctx, "missing").unwrap_err();
        assert!(matches!(
            err,
            BuildError::Config(ConfigError::TargetNotFound(ref n)) if n == "missing"
        ));
    }

    #[test]
    fn test_unknown_dependency_fails_at_execution() {
        let logger = MemoryLogger::new();
        let mut ctx = TaskContext::with_memory_logger(&logger);
        let mut tree = TargetTree::new();
        tree.add_target("build").unwrap().depends_on(["restore"]);

        let err = tree.run_target(&mut ctx, "build").unwrap_err();
        assert!(err.to_string().contains("restore"));
        assert!(!tree.is_executed("build"));
    }

    #[test]
    fn test_self_dependency_is_circular() {
        let logger = MemoryLogger::new();
        let mut ctx = TaskContext::with_memory_logger(&logger);
        let mut tree = TargetTree::new();
        tree.add_target("loop").unwrap().depends_on(["loop"]);

        let err = tree.run_target(&mut ctx, "loop").unwrap_err();
        assert!(matches!(
            err,
            BuildError::Config(ConfigError::CircularDependency(ref p)) if p == "loop -> loop"
        ));
    }
}
