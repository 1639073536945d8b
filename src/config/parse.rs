//! Build script parsing and discovery

use crate::config::types::{BuildScript, TargetConfig};
use crate::error::{BuildError, ConfigError, ConfigResult};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default build script names to search for
pub const SCRIPT_FILE_NAMES: &[&str] = &["buildtree.yml", "buildtree.yaml"];

/// Find the build script by searching current and parent directories
pub fn find_build_script() -> ConfigResult<PathBuf> {
    find_build_script_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the build script starting from a specific directory
pub fn find_build_script_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in SCRIPT_FILE_NAMES {
            let script_path = current_dir.join(file_name);
            searched_paths.push(script_path.display().to_string());

            if script_path.is_file() {
                return Ok(script_path);
            }
        }

        // Try parent directory
        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a build script from a path
pub fn parse_script_file(path: &Path) -> Result<BuildScript, BuildError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e)))?;

    parse_script(&contents, Some(path))
}

/// Parse a build script from a string. Includes are resolved relative to
/// `script_path` when it is given.
pub fn parse_script(yaml: &str, script_path: Option<&Path>) -> Result<BuildScript, BuildError> {
    let mut script: BuildScript = serde_yaml::from_str(yaml)?;

    if let Some(base_path) = script_path {
        process_includes(&mut script, base_path)?;
    }

    Ok(script)
}

/// Replace targets that have an `include` with the included definition
fn process_includes(script: &mut BuildScript, script_path: &Path) -> Result<(), BuildError> {
    let base_dir = script_path.parent().unwrap_or_else(|| Path::new("."));

    for target in script.targets.values_mut() {
        if let Some(include_path) = target.include.take() {
            *target = load_included_target(&base_dir.join(include_path))?;
        }
    }

    Ok(())
}

/// Load a target definition from an included file
fn load_included_target(path: &Path) -> Result<TargetConfig, BuildError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::IncludeFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let target: TargetConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::IncludeFile {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

    if target.include.is_some() {
        return Err(ConfigError::IncludeFile {
            path: path.to_path_buf(),
            error: "included targets cannot include other files".to_string(),
        }
        .into());
    }

    Ok(target)
}
