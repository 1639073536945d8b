//! Turning a build script into a target tree
//!
//! Each script target becomes a [`Target`](crate::runner::Target) whose action
//! runs the target's steps in order. Steps are interpolated against the
//! context properties right before they run, so a step sees properties set
//! by the steps and targets before it.

use crate::config::schema::validate_script;
use crate::config::types::{BuildScript, ProgramStep, ReadConfigSource, Step};
use crate::error::{ConfigError, ConfigResult, Result};
use crate::runner::{
    interpolate, interpolate_list, ActionTask, Properties, ReadConfigurationTask,
    RunProgramTask, TargetTree, Task, TaskContext,
};
use std::time::Duration;

/// Interpreter used for shell steps when the script does not name one
pub fn default_interpreter() -> Vec<String> {
    if cfg!(windows) {
        vec!["cmd".to_string(), "/C".to_string()]
    } else {
        vec!["sh".to_string(), "-c".to_string()]
    }
}

/// Properties a run starts with
pub fn initial_properties(script: &BuildScript) -> Properties {
    script
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Validate the script and build its target tree
pub fn build_target_tree(script: &BuildScript) -> ConfigResult<TargetTree> {
    validate_script(script)?;

    let interpreter = script
        .interpreter
        .clone()
        .unwrap_or_else(default_interpreter);

    let mut names: Vec<&String> = script.targets.keys().collect();
    names.sort();

    let mut tree = TargetTree::new();
    for name in names {
        let config = &script.targets[name];

        let mut builder = tree
            .add_target(name.clone())?
            .depends_on(config.depends_on.iter().cloned())
            .set_dry_run_safe(config.dry_run_safe);
        if let Some(description) = &config.description {
            builder = builder.set_description(description.clone());
        }
        if config.hidden {
            builder = builder.set_as_hidden();
        }

        if !config.steps.is_empty() {
            let steps = config.steps.clone();
            let interpreter = interpreter.clone();
            builder.does(move |ctx: &mut TaskContext| {
                for step in &steps {
                    execute_step(step, &interpreter, ctx)?;
                }
                Ok(())
            })?;
        }
    }

    if let Some(default) = &script.default {
        tree.set_default_target(default)?;
    }

    Ok(tree)
}

/// Run one step against the context
pub fn execute_step(step: &Step, interpreter: &[String], ctx: &mut TaskContext) -> Result<()> {
    match step {
        Step::Shell(command) => {
            let command = interpolate(command, ctx.properties().as_map())?;
            let (program, leading) = interpreter.split_first().ok_or_else(|| {
                ConfigError::Invalid("interpreter must name at least a program".to_string())
            })?;

            let mut task = RunProgramTask::new(program.clone());
            task.add_arguments(leading.iter().cloned()).add_argument(command);
            task.execute(ctx)
        }
        Step::Program(program) => program_task(program, ctx)?.execute(ctx),
        Step::Set(set) => {
            let mut values = Vec::with_capacity(set.set.len());
            for (key, value) in &set.set {
                values.push((key.clone(), interpolate(value, ctx.properties().as_map())?));
            }
            values.sort();

            let keys: Vec<&str> = values.iter().map(|(k, _)| k.as_str()).collect();
            let description = format!("Set {}", keys.join(", "));
            ActionTask::new(description, move |ctx: &mut TaskContext| {
                for (key, value) in &values {
                    ctx.properties_mut().set(key.clone(), value.clone());
                }
                Ok(())
            })
            .safe_in_dry_run()
            .execute(ctx)
        }
        Step::ReadConfig(read) => {
            let vars = ctx.properties().as_map();
            let mut task = match &read.read_config {
                ReadConfigSource::Path(file) => ReadConfigurationTask::new(interpolate(file, vars)?),
                ReadConfigSource::Detail(detail) => {
                    let mut task = ReadConfigurationTask::new(interpolate(&detail.file, vars)?)
                        .optional(detail.optional);
                    if let Some(prefix) = &detail.prefix {
                        task = task.with_prefix(interpolate(prefix, vars)?);
                    }
                    task
                }
            };
            task.execute(ctx)
        }
        Step::Log(log) => {
            let message = interpolate(&log.log, ctx.properties().as_map())?;
            ctx.write_info(&message);
            Ok(())
        }
    }
}

fn program_task(step: &ProgramStep, ctx: &TaskContext) -> Result<RunProgramTask> {
    let vars = ctx.properties().as_map();

    let mut task = RunProgramTask::new(interpolate(&step.run, vars)?);
    task.enclose_parameters_in_quotes(step.quote_args)
        .add_arguments(interpolate_list(&step.args, vars)?);
    if let Some(dir) = &step.dir {
        task.set_working_dir(interpolate(dir, vars)?);
    }
    if let Some(seconds) = step.timeout {
        task.set_timeout(Duration::from_secs(seconds));
    }
    if step.ignore_exit_code {
        task.ignore_exit_codes();
    }
    Ok(task)
}
