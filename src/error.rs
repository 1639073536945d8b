//! Error types for buildtree

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for buildtree operations
pub type Result<T> = std::result::Result<T, BuildError>;

/// Main error type for buildtree
#[derive(Error, Debug)]
pub enum BuildError {
    /// Build script or target tree misconfiguration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A task or program failed
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Variable interpolation errors
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BuildError {
    /// Whether this error came from a misconfigured build rather than a failing task
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, BuildError::Config(_))
    }
}

/// Build script and target tree configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find build script (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Target '{0}' is already defined")]
    DuplicateTarget(String),

    #[error("Target '{0}' is not defined")]
    TargetNotFound(String),

    #[error("Target '{0}' already has an action, use override_do to replace it")]
    ActionAlreadySet(String),

    #[error("Required parameter '{0}' is missing")]
    MissingParameter(String),

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Failed to include file '{path}': {error}")]
    IncludeFile { path: PathBuf, error: String },
}

/// Failures while running tasks and external programs
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Program '{program}' failed with exit code {exit_code}")]
    ProgramFailed { program: String, exit_code: i32 },

    #[error("Program '{program}' terminated without an exit code")]
    Terminated { program: String },

    #[error("Program '{program}' timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("Failed to start program '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Lost track of program '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Failed(String),
}

impl ExecutionError {
    /// Exit code carried by the failure, if the program got far enough to report one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionError::ProgramFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

/// Variable interpolation errors
#[derive(Error, Debug)]
pub enum InterpolationError {
    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("Recursive interpolation detected")]
    RecursiveInterpolation,
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result of running a program or task step
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Specialized result type for interpolation operations
pub type InterpolationResult<T> = std::result::Result<T, InterpolationError>;
