//! Running external programs as tasks

use crate::error::{ConfigError, ExecutionError, Result};
use crate::runner::{
    CapturedOutput, LineSink, ProcessInvocation, ProcessRunner, SystemProcessRunner, Task,
    TaskContext,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runs a program with a command line built up argument by argument.
///
/// A non-zero exit code fails the task unless [`RunProgramTask::ignore_exit_codes`]
/// was set, in which case the code is only recorded.
pub struct RunProgramTask {
    program: String,
    arguments: Vec<String>,
    working_dir: Option<PathBuf>,
    quote_arguments: bool,
    timeout: Option<Duration>,
    ignore_exit_codes: bool,
    capture_output: bool,
    runner: Box<dyn ProcessRunner>,
    exit_code: Option<i32>,
    output: CapturedOutput,
}

impl RunProgramTask {
    pub fn new(program: impl Into<String>) -> Self {
        RunProgramTask {
            program: program.into(),
            arguments: Vec::new(),
            working_dir: None,
            quote_arguments: true,
            timeout: None,
            ignore_exit_codes: false,
            capture_output: false,
            runner: Box::new(SystemProcessRunner),
            exit_code: None,
            output: CapturedOutput::default(),
        }
    }

    /// Append one argument. Use `format!` for formatted arguments.
    pub fn add_argument(&mut self, argument: impl Into<String>) -> &mut Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn add_arguments<I, S>(&mut self, arguments: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    /// Directory to run in; relative paths are resolved against the context
    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// When disabled, each argument is split into words with shell rules
    /// instead of being passed as a single argument
    pub fn enclose_parameters_in_quotes(&mut self, enclose: bool) -> &mut Self {
        self.quote_arguments = enclose;
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn ignore_exit_codes(&mut self) -> &mut Self {
        self.ignore_exit_codes = true;
        self
    }

    /// Keep the program's output for [`RunProgramTask::output`]
    pub fn capture_output(&mut self) -> &mut Self {
        self.capture_output = true;
        self
    }

    pub fn with_runner(&mut self, runner: Box<dyn ProcessRunner>) -> &mut Self {
        self.runner = runner;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Exit code of the last run, if the program exited normally
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn output(&self) -> &CapturedOutput {
        &self.output
    }

    /// The arguments rendered as one command line
    pub fn command_line(&self) -> String {
        if self.quote_arguments {
            self.arguments
                .iter()
                .map(|a| quote_argument(a))
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            self.arguments.join(" ")
        }
    }

    /// The argument vector handed to the process
    pub fn process_arguments(&self) -> Result<Vec<String>> {
        if self.quote_arguments {
            return Ok(self.arguments.clone());
        }

        let mut words = Vec::new();
        for argument in &self.arguments {
            let split = shell_words::split(argument).map_err(|e| {
                ConfigError::Invalid(format!("Cannot split argument '{}': {}", argument, e))
            })?;
            words.extend(split);
        }
        Ok(words)
    }

    fn invocation(&self, ctx: &TaskContext) -> Result<ProcessInvocation> {
        if self.program.trim().is_empty() {
            return Err(ConfigError::MissingParameter("program".to_string()).into());
        }

        // A relative path with a directory part is relative to the build,
        // not to wherever the process was started.
        let program = Path::new(&self.program);
        let has_dir = program
            .parent()
            .is_some_and(|p| !p.as_os_str().is_empty());
        let program = if has_dir && program.is_relative() {
            ctx.resolve_path(program)
        } else {
            program.to_path_buf()
        };

        let mut invocation = ProcessInvocation::new(program).args(self.process_arguments()?);
        if let Some(dir) = &self.working_dir {
            invocation = invocation.working_dir(ctx.resolve_path(dir));
        } else if !has_dir {
            invocation = invocation.working_dir(ctx.working_dir());
        }

        if let Some(timeout) = self.timeout {
            invocation = invocation.timeout(timeout);
        }
        Ok(invocation)
    }
}

impl Task for RunProgramTask {
    fn description(&self) -> String {
        let command_line = self.command_line();
        if command_line.is_empty() {
            format!("Run program '{}'", self.program)
        } else {
            format!("Run program '{} {}'", self.program, command_line)
        }
    }

    fn do_execute(&mut self, ctx: &mut TaskContext) -> Result<()> {
        let invocation = self.invocation(ctx)?;

        let mut captured = CapturedOutput::default();
        let outcome = {
            let mut sink = ContextSink {
                ctx: &mut *ctx,
                capture: self.capture_output.then_some(&mut captured),
            };
            self.runner.run(&invocation, &mut sink)?
        };
        self.output = captured;
        self.exit_code = outcome.exit_code;

        if outcome.timed_out {
            let timeout = self.timeout.unwrap_or_default();
            if self.ignore_exit_codes {
                ctx.write_warn(&format!("Timed out after {:?}, ignored", timeout));
                return Ok(());
            }
            return Err(ExecutionError::TimedOut {
                program: self.program.clone(),
                timeout,
            }
            .into());
        }

        match outcome.exit_code {
            Some(0) => Ok(()),
            Some(code) if self.ignore_exit_codes => {
                ctx.write_info(&format!("Exit code {} ignored", code));
                Ok(())
            }
            Some(code) => Err(ExecutionError::ProgramFailed {
                program: self.program.clone(),
                exit_code: code,
            }
            .into()),
            None if self.ignore_exit_codes => Ok(()),
            None => Err(ExecutionError::Terminated {
                program: self.program.clone(),
            }
            .into()),
        }
    }
}

/// Logs program output through the context, optionally keeping a copy
struct ContextSink<'a> {
    ctx: &'a mut TaskContext,
    capture: Option<&'a mut CapturedOutput>,
}

impl LineSink for ContextSink<'_> {
    fn stdout_line(&mut self, line: &str) {
        self.ctx.write_info(line);
        if let Some(capture) = self.capture.as_deref_mut() {
            capture.stdout_line(line);
        }
    }

    fn stderr_line(&mut self, line: &str) {
        self.ctx.write_warn(line);
        if let Some(capture) = self.capture.as_deref_mut() {
            capture.stderr_line(line);
        }
    }
}

fn quote_argument(argument: &str) -> String {
    let needs_quotes =
        argument.is_empty() || argument.chars().any(|c| c.is_whitespace() || c == '"');
    if needs_quotes {
        format!("\"{}\"", argument.replace('"', "\\\""))
    } else {
        argument.to_string()
    }
}
