//! Core build script types
//!
//! This module defines the data structures that represent a buildtree.yml file.

use crate::runner::scalar_to_string;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level build script structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BuildScript {
    /// Project name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Target to run when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Interpreter for shell steps (e.g., ["sh", "-c"])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Vec<String>>,

    /// Initial build properties
    #[serde(
        default,
        skip_serializing_if = "HashMap::is_empty",
        deserialize_with = "deserialize_properties"
    )]
    pub properties: HashMap<String, String>,

    /// Targets defined in the script
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

/// A target definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetConfig {
    /// Description shown by `help`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Targets that must run first
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_names"
    )]
    pub depends_on: Vec<String>,

    /// Hidden from `help`
    #[serde(default)]
    pub hidden: bool,

    /// Whether the steps are visited during a dry run. Each step still
    /// decides for itself whether it is safe to run.
    #[serde(default = "default_true")]
    pub dry_run_safe: bool,

    /// Steps to execute, in order
    #[serde(default, deserialize_with = "deserialize_steps")]
    pub steps: Vec<Step>,

    /// Load the target definition from another file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
}

/// One step of a target
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Step {
    /// Shell command run through the interpreter
    Shell(String),

    /// Program with an explicit argument list
    Program(ProgramStep),

    /// Set properties
    Set(SetStep),

    /// Read a configuration file into properties
    ReadConfig(ReadConfigStep),

    /// Write a message
    Log(LogStep),
}

/// Run a program directly, without a shell
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProgramStep {
    /// Program to run
    pub run: String,

    /// Arguments, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Working directory, relative to the script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Pass each argument whole (true) or split it into words (false)
    #[serde(default = "default_true")]
    pub quote_args: bool,

    /// Record a non-zero exit code instead of failing
    #[serde(default)]
    pub ignore_exit_code: bool,
}

/// Set one or more properties
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SetStep {
    #[serde(deserialize_with = "deserialize_properties")]
    pub set: HashMap<String, String>,
}

/// Read a configuration file
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReadConfigStep {
    pub read_config: ReadConfigSource,
}

/// Where a configuration file comes from
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ReadConfigSource {
    /// Just the path
    Path(String),

    /// Path with options
    Detail(ReadConfigDetail),
}

/// Detailed configuration file source
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReadConfigDetail {
    pub file: String,

    /// Prefix for every key read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Skip silently when the file is missing
    #[serde(default)]
    pub optional: bool,
}

/// Write a message to the build log
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogStep {
    pub log: String,
}

fn default_true() -> bool {
    true
}

/// Custom deserializer for steps that handles both single values and arrays
fn deserialize_steps<'de, D>(deserializer: D) -> Result<Vec<Step>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Single shell command
        Value::String(s) => Ok(vec![Step::Shell(s)]),
        // Single structured step
        Value::Mapping(_) => {
            let step = Step::deserialize(value).map_err(D::Error::custom)?;
            Ok(vec![step])
        }
        // Array of steps
        Value::Sequence(seq) => {
            let mut steps = Vec::new();
            for item in seq {
                let step = Step::deserialize(item).map_err(D::Error::custom)?;
                steps.push(step);
            }
            Ok(steps)
        }
        // Null or not present
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("steps must be a string, object, or array")),
    }
}

/// Custom deserializer for target names given as one string or a list
fn deserialize_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::String(s) => Ok(vec![s]),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(D::Error::custom("target names must be strings")),
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("depends-on must be a string or array")),
    }
}

/// Custom deserializer for property maps, accepting any scalar value
fn deserialize_properties<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Mapping(mapping) => mapping
            .iter()
            .map(|(key, value)| {
                let key = scalar_to_string(key)
                    .ok_or_else(|| D::Error::custom("property names must be scalars"))?;
                let value = scalar_to_string(value).ok_or_else(|| {
                    D::Error::custom(format!("property '{}' must be a scalar", key))
                })?;
                Ok((key, value))
            })
            .collect(),
        Value::Null => Ok(HashMap::new()),
        _ => Err(D::Error::custom("properties must be a mapping")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_simple_script() {
        let yaml = r#"
targets:
  hello:
    description: Say hello
    steps: echo "hello"
"#;
        let script: BuildScript = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(script.targets.len(), 1);
        let hello = script.targets.get("hello").unwrap();
        assert!(matches!(hello.steps.as_slice(), [Step::Shell(cmd)] if cmd == "echo \"hello\""));
    }

    #[test]
    fn test_deserialize_step_kinds() {
        let yaml = r#"
targets:
  build:
    depends-on: restore
    steps:
      - cargo fmt --check
      - run: cargo
        args: [build, --release]
        timeout: 60
      - set:
          version: 1.2
          release: true
      - read-config: settings.yml
      - read-config:
          file: deploy.yml
          prefix: deploy
          optional: true
      - log: "Built ${version}"
"#;
        let script: BuildScript = serde_yaml::from_str(yaml).unwrap();
        let build = script.targets.get("build").unwrap();
        assert_eq!(build.depends_on, vec!["restore"]);
        assert_eq!(build.steps.len(), 6);

        match &build.steps[1] {
            Step::Program(program) => {
                assert_eq!(program.run, "cargo");
                assert_eq!(program.args, vec!["build", "--release"]);
                assert_eq!(program.timeout, Some(60));
                assert!(program.quote_args);
                assert!(!program.ignore_exit_code);
            }
            other => panic!("expected program step, got {:?}", other),
        }
        match &build.steps[2] {
            Step::Set(set) => {
                assert_eq!(set.set.get("version").map(String::as_str), Some("1.2"));
                assert_eq!(set.set.get("release").map(String::as_str), Some("true"));
            }
            other => panic!("expected set step, got {:?}", other),
        }
        assert!(matches!(
            &build.steps[3],
            Step::ReadConfig(ReadConfigStep { read_config: ReadConfigSource::Path(p) }) if p == "settings.yml"
        ));
        assert!(matches!(
            &build.steps[4],
            Step::ReadConfig(ReadConfigStep { read_config: ReadConfigSource::Detail(d) }) if d.optional
        ));
        assert!(matches!(&build.steps[5], Step::Log(_)));
    }

    #[test]
    fn test_unknown_step_is_rejected() {
        let yaml = r#"
targets:
  broken:
    steps:
      - copy: a.txt
"#;
        assert!(serde_yaml::from_str::<BuildScript>(yaml).is_err());
    }

    #[test]
    fn test_properties_accept_scalars() {
        let yaml = r#"
properties:
  configuration: Release
  retries: 3
targets: {}
"#;
        let script: BuildScript = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            script.properties.get("retries").map(String::as_str),
            Some("3")
        );
    }
}
