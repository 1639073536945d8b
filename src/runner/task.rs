//! The task execution contract
//!
//! A task is one reusable unit of work. Implementors supply [`Task::description`]
//! and [`Task::do_execute`]; callers always go through [`Task::execute`], which
//! wraps the work with logging, depth tracking, timing and the dry-run check.

use crate::error::Result;
use crate::runner::TaskContext;
use std::fmt;
use std::time::Instant;

/// A unit of build work
pub trait Task {
    /// Human readable description, used for logging and dry runs
    fn description(&self) -> String;

    /// Whether `do_execute` may run while the context is in dry-run mode
    fn is_safe_to_execute_in_dry_run(&self) -> bool {
        false
    }

    /// The task-specific work. Call [`Task::execute`] instead of this.
    fn do_execute(&mut self, ctx: &mut TaskContext) -> Result<()>;

    /// Run the task with the common bookkeeping.
    ///
    /// Errors from `do_execute` are returned unchanged once the depth has
    /// been restored and the outcome logged.
    fn execute(&mut self, ctx: &mut TaskContext) -> Result<()> {
        let description = self.description();
        ctx.write_info(&description);

        let started = Instant::now();
        let result = {
            let mut scope = ctx.nested();
            if scope.is_dry_run() && !self.is_safe_to_execute_in_dry_run() {
                scope.write_debug("(dry run) skipped");
                Ok(())
            } else {
                self.do_execute(&mut scope)
            }
        };
        let seconds = started.elapsed().as_secs_f64();

        match &result {
            Ok(()) => ctx.write_debug(&format!("{} finished (took {:.2}s)", description, seconds)),
            Err(_) => ctx.write_warn(&format!("{} failed (took {:.2}s)", description, seconds)),
        }

        result
    }
}

type Action = Box<dyn FnMut(&mut TaskContext) -> Result<()>>;

/// A task built from a closure
pub struct ActionTask {
    description: String,
    safe_in_dry_run: bool,
    action: Action,
}

impl ActionTask {
    pub fn new<F>(description: impl Into<String>, action: F) -> Self
    where
        F: FnMut(&mut TaskContext) -> Result<()> + 'static,
    {
        ActionTask {
            description: description.into(),
            safe_in_dry_run: false,
            action: Box::new(action),
        }
    }

    /// Allow the closure to run during dry runs
    pub fn safe_in_dry_run(mut self) -> Self {
        self.safe_in_dry_run = true;
        self
    }
}

impl fmt::Debug for ActionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTask")
            .field("description", &self.description)
            .field("safe_in_dry_run", &self.safe_in_dry_run)
            .finish_non_exhaustive()
    }
}

impl Task for ActionTask {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn is_safe_to_execute_in_dry_run(&self) -> bool {
        self.safe_in_dry_run
    }

    fn do_execute(&mut self, ctx: &mut TaskContext) -> Result<()> {
        (self.action)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use crate::log::{LogLevel, MemoryLogger};
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingTask {
        runs: Rc<Cell<usize>>,
        depth_seen: Rc<Cell<usize>>,
        fail: bool,
    }

    impl Task for CountingTask {
        fn description(&self) -> String {
            "Counting things".to_string()
        }

        fn do_execute(&mut self, ctx: &mut TaskContext) -> Result<()> {
            self.runs.set(self.runs.get() + 1);
            self.depth_seen.set(ctx.depth());
            if self.fail {
                return Err(ExecutionError::Failed("counting went wrong".to_string()).into());
            }
            Ok(())
        }
    }

    fn counting(fail: bool) -> (CountingTask, Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let depth = Rc::new(Cell::new(0));
        let task = CountingTask {
            runs: runs.clone(),
            depth_seen: depth.clone(),
            fail,
        };
        (task, runs, depth)
    }

    #[test]
    fn test_execute_runs_action_one_level_deeper() {
        let logger = MemoryLogger::new();
        let mut ctx = TaskContext::with_memory_logger(&logger);
        let (mut task, runs, depth) = counting(false);

        task.execute(&mut ctx).unwrap();

        assert_eq!(runs.get(), 1);
        assert_eq!(depth.get(), 1);
        assert_eq!(ctx.depth(), 0);

        let entries = logger.entries();
        assert_eq!(entries[0].text, "Counting things");
        assert_eq!(entries[0].level, LogLevel::Info);
        assert!(entries
            .last()
            .unwrap()
            .text
            .starts_with("Counting things finished (took "));
    }

    #[test]
    fn test_failure_propagates_and_depth_is_restored() {
        let logger = MemoryLogger::new();
        let mut ctx = TaskContext::with_memory_logger(&logger);
        let (mut task, runs, _) = counting(true);

        let err = task.execute(&mut ctx).unwrap_err();

        assert_eq!(runs.get(), 1);
        assert_eq!(ctx.depth(), 0);
        assert!(err.to_string().contains("counting went wrong"));
        assert!(logger.contains("Counting things failed"));
    }

    #[test]
    fn test_dry_run_skips_unsafe_task() {
        let logger = MemoryLogger::new();
        let mut ctx = TaskContext::with_memory_logger(&logger).with_dry_run(true);
        let (mut task, runs, _) = counting(false);

        task.execute(&mut ctx).unwrap();

        assert_eq!(runs.get(), 0);
        assert!(logger.contains("Counting things"));
        assert!(logger.contains("(dry run) skipped"));
    }

    #[test]
    fn test_dry_run_runs_safe_task() {
        let logger = MemoryLogger::new();
        let mut ctx = TaskContext::with_memory_logger(&logger).with_dry_run(true);
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let mut task = ActionTask::new("Print banner", move |_ctx: &mut TaskContext| {
            counter.set(counter.get() + 1);
            Ok(())
        })
        .safe_in_dry_run();

        task.execute(&mut ctx).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_action_task_can_write_properties() {
        let logger = MemoryLogger::new();
        let mut ctx = TaskContext::with_memory_logger(&logger);
        let mut task = ActionTask::new("Set version", |ctx: &mut TaskContext| {
            ctx.properties_mut().set("version", "1.0.0");
            Ok(())
        });

        task.execute(&mut ctx).unwrap();
        assert_eq!(ctx.properties().get("version"), Some("1.0.0"));
    }
}
