use anyhow::Result;
use regex::{Captures, Regex};
use std::env;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{(\w+)(?::-([^}]*))?\}|\$(\w+)").expect("placeholder pattern is valid")
    })
}

fn unresolved_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{\w+\}|\$[A-Za-z_]\w*").expect("placeholder pattern is valid"))
}

/// Substitute `${VAR}`, `$VAR` and `${VAR:-default}` placeholders
///
/// A placeholder whose variable is unset and has no default is left in place
/// for the validator to report.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let mut missing_vars = Vec::new();

    let result = placeholder_regex().replace_all(content, |caps: &Captures| {
        let var_name = caps
            .get(1)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();

        match env::var(var_name) {
            Ok(value) => {
                debug!("Substituting environment variable: {}", var_name);
                value
            }
            Err(_) => match caps.get(2) {
                Some(default) => default.as_str().to_string(),
                None => {
                    warn!("Environment variable '{}' not set", var_name);
                    missing_vars.push(var_name.to_string());
                    caps[0].to_string()
                }
            },
        }
    });

    if !missing_vars.is_empty() {
        debug!("Environment variables left unresolved: {:?}", missing_vars);
    }

    Ok(result.into_owned())
}

/// Get environment variable with a default value
pub fn get_env_or_default(var_name: &str, default: &str) -> String {
    env::var(var_name).unwrap_or_else(|_| default.to_string())
}

/// Check if a string still contains a `${VAR}` or `$VAR` placeholder
pub fn has_unresolved_env_vars(content: &str) -> bool {
    unresolved_regex().is_match(content)
}
