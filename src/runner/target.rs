//! Build targets
//!
//! A target is a named node in the [`TargetTree`](crate::runner::TargetTree)
//! with a list of dependencies and an action. It follows the task contract,
//! with the action as its `do_execute`.

use crate::error::{ConfigError, ConfigResult, Result};
use crate::runner::{Task, TaskContext};
use std::fmt;
use std::time::{Duration, Instant};

/// The work a target performs
pub type TargetAction = Box<dyn FnMut(&mut TaskContext) -> Result<()>>;

/// A named unit of build work with dependencies.
///
/// Dependencies are resolved by [`TargetTree`](crate::runner::TargetTree).
/// Calling [`Task::execute`] on a target directly runs only its action: it
/// neither runs the dependencies nor consults the tree's executed set.
pub struct Target {
    name: String,
    dependencies: Vec<String>,
    action: Option<TargetAction>,
    /// The action was installed by the tree rather than by a build script
    generated_action: bool,
    description: Option<String>,
    hidden: bool,
    safe_in_dry_run: bool,
    duration: Option<Duration>,
}

impl Target {
    pub(crate) fn new(name: String) -> Self {
        Target {
            name,
            dependencies: Vec::new(),
            action: None,
            generated_action: false,
            description: None,
            hidden: false,
            safe_in_dry_run: false,
            duration: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dependency names in declaration order, duplicates included
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// The description shown by `help`
    pub fn summary(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }

    /// How long the action took the last time it ran
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Append dependencies. Duplicates are allowed and run once.
    pub fn depends_on<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set the action. Fails if the target already has one.
    pub fn does<F>(&mut self, action: F) -> ConfigResult<&mut Self>
    where
        F: FnMut(&mut TaskContext) -> Result<()> + 'static,
    {
        if self.action.is_some() && !self.generated_action {
            return Err(ConfigError::ActionAlreadySet(self.name.clone()));
        }
        Ok(self.override_do(action))
    }

    /// Replace the action unconditionally
    pub fn override_do<F>(&mut self, action: F) -> &mut Self
    where
        F: FnMut(&mut TaskContext) -> Result<()> + 'static,
    {
        self.action = Some(Box::new(action));
        self.generated_action = false;
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// Leave the target out of the `help` listing
    pub fn set_as_hidden(&mut self) -> &mut Self {
        self.hidden = true;
        self
    }

    pub fn set_dry_run_safe(&mut self, safe: bool) -> &mut Self {
        self.safe_in_dry_run = safe;
        self
    }

    pub(crate) fn install_generated_action<F>(&mut self, action: F)
    where
        F: FnMut(&mut TaskContext) -> Result<()> + 'static,
    {
        self.action = Some(Box::new(action));
        self.generated_action = true;
    }

    /// Whether the action is missing or was generated by the tree
    pub(crate) fn accepts_generated_action(&self) -> bool {
        self.action.is_none() || self.generated_action
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("has_action", &self.action.is_some())
            .field("description", &self.description)
            .field("hidden", &self.hidden)
            .field("safe_in_dry_run", &self.safe_in_dry_run)
            .field("duration", &self.duration)
            .finish()
    }
}

impl Task for Target {
    fn description(&self) -> String {
        format!("Target '{}'", self.name)
    }

    fn is_safe_to_execute_in_dry_run(&self) -> bool {
        self.safe_in_dry_run
    }

    fn do_execute(&mut self, ctx: &mut TaskContext) -> Result<()> {
        let started = Instant::now();
        let result = match self.action.as_mut() {
            Some(action) => action(ctx),
            None => Ok(()),
        };
        self.duration = Some(started.elapsed());
        result
    }
}

/// Fluent configuration of a target freshly added to a tree
pub struct TargetBuilder<'a> {
    target: &'a mut Target,
    default_target: &'a mut Option<String>,
}

impl<'a> TargetBuilder<'a> {
    pub(crate) fn new(target: &'a mut Target, default_target: &'a mut Option<String>) -> Self {
        TargetBuilder {
            target,
            default_target,
        }
    }

    pub fn depends_on<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target.depends_on(names);
        self
    }

    pub fn does<F>(self, action: F) -> ConfigResult<Self>
    where
        F: FnMut(&mut TaskContext) -> Result<()> + 'static,
    {
        self.target.does(action)?;
        Ok(self)
    }

    pub fn override_do<F>(self, action: F) -> Self
    where
        F: FnMut(&mut TaskContext) -> Result<()> + 'static,
    {
        self.target.override_do(action);
        self
    }

    /// Make this the target that runs when none is named
    pub fn set_as_default(self) -> Self {
        *self.default_target = Some(self.target.name().to_string());
        self
    }

    pub fn set_description(self, description: impl Into<String>) -> Self {
        self.target.set_description(description);
        self
    }

    pub fn set_as_hidden(self) -> Self {
        self.target.set_as_hidden();
        self
    }

    pub fn set_dry_run_safe(self, safe: bool) -> Self {
        self.target.set_dry_run_safe(safe);
        self
    }

    /// Borrow the underlying target
    pub fn target(&mut self) -> &mut Target {
        self.target
    }
}
