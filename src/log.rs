//! Log sinks for build output
//!
//! Every message a target or task writes goes through [`Logger::write_message`]
//! together with the current nesting depth, so sinks can indent nested work.

use colored::Colorize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Severity of a build message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(tag)
    }
}

/// Verbosity levels for console output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

impl Verbosity {
    /// Whether a message of the given level is shown at this verbosity
    pub fn allows(self, level: LogLevel) -> bool {
        match level {
            LogLevel::Error => self >= Verbosity::Quiet,
            LogLevel::Warn | LogLevel::Info => self >= Verbosity::Normal,
            LogLevel::Debug => self >= Verbosity::Verbose,
        }
    }
}

/// Sink for build messages
pub trait Logger {
    fn write_message(&mut self, level: LogLevel, depth: usize, text: &str);
}

/// Writes colored, indented messages to stderr
pub struct ConsoleLogger {
    verbosity: Verbosity,
}

impl ConsoleLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        ConsoleLogger { verbosity }
    }

    fn tag(level: LogLevel) -> colored::ColoredString {
        let tag = format!("[{}]", level);
        match level {
            LogLevel::Debug => tag.dimmed(),
            LogLevel::Info => tag.cyan(),
            LogLevel::Warn => tag.yellow(),
            LogLevel::Error => tag.red().bold(),
        }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new(Verbosity::Normal)
    }
}

impl Logger for ConsoleLogger {
    fn write_message(&mut self, level: LogLevel, depth: usize, text: &str) {
        if self.verbosity.allows(level) {
            eprintln!("{} {}{}", Self::tag(level), indent(depth), text);
        }
    }
}

/// Forwards build messages to `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn write_message(&mut self, level: LogLevel, depth: usize, text: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(depth, "{}", text),
            LogLevel::Info => tracing::info!(depth, "{}", text),
            LogLevel::Warn => tracing::warn!(depth, "{}", text),
            LogLevel::Error => tracing::error!(depth, "{}", text),
        }
    }
}

/// A message recorded by [`MemoryLogger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub depth: usize,
    pub text: String,
}

/// Keeps messages in memory.
///
/// Clones share the same buffer, so a clone handed to a context can be
/// inspected through the original after the run.
#[derive(Debug, Default, Clone)]
pub struct MemoryLogger {
    entries: Rc<RefCell<Vec<LogEntry>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    /// Message texts only, in the order they were written
    pub fn lines(&self) -> Vec<String> {
        self.entries.borrow().iter().map(|e| e.text.clone()).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.borrow().iter().any(|e| e.text.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl Logger for MemoryLogger {
    fn write_message(&mut self, level: LogLevel, depth: usize, text: &str) {
        self.entries.borrow_mut().push(LogEntry {
            level,
            depth,
            text: text.to_string(),
        });
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}
