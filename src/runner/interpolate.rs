//! Variable interpolation for strings
//!
//! Replaces `${name}` with the matching property, falling back to the
//! environment. Unknown names are left in place unless strict mode is used.

use crate::error::{InterpolationError, InterpolationResult};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::env;
use std::sync::OnceLock;

/// Properties may refer to other properties; give up after this many passes
const MAX_PASSES: usize = 16;

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("variable pattern is valid"))
}

/// Expand every `${name}` in `s`. Values may themselves contain
/// placeholders; expansion repeats until nothing changes.
pub fn interpolate(s: &str, vars: &HashMap<String, String>) -> InterpolationResult<String> {
    let re = variable_pattern();
    let mut result = s.to_string();

    for _ in 0..MAX_PASSES {
        let mut changed = false;
        let next = re
            .replace_all(&result, |caps: &Captures| {
                let name = &caps[1];
                if let Some(value) = vars.get(name) {
                    changed = true;
                    return value.clone();
                }
                if let Ok(value) = env::var(name) {
                    changed = true;
                    return value;
                }
                caps[0].to_string()
            })
            .into_owned();

        if !changed {
            return Ok(next);
        }
        result = next;
    }

    Err(InterpolationError::RecursiveInterpolation)
}

/// Like [`interpolate`], but a placeholder left unexpanded is an error
pub fn interpolate_strict(
    s: &str,
    vars: &HashMap<String, String>,
) -> InterpolationResult<String> {
    let result = interpolate(s, vars)?;

    if let Some(caps) = variable_pattern().captures(&result) {
        return Err(InterpolationError::UndefinedVariable(caps[1].to_string()));
    }

    Ok(result)
}

/// Expand each string of an argument list
pub fn interpolate_list(
    list: &[String],
    vars: &HashMap<String, String>,
) -> InterpolationResult<Vec<String>> {
    list.iter()
        .map(|s| interpolate(s, vars))
        .collect::<InterpolationResult<Vec<String>>>()
}
