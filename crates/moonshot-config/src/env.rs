use std::sync::LazyLock;

use regex::Regex;

/// Matches `{{ env.VAR }}` and `{{ env.VAR | default("fallback") }}`
static PLACEHOLDER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#));

/// Failure while expanding placeholders in the raw configuration
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// Referenced variable is unset and has no default
    #[error("environment variable not found: `{0}`")]
    NotFound(String),
    /// Placeholder uses a scope other than `env.`
    #[error("only variables scoped with 'env.' are supported: `{0}`")]
    UnsupportedScope(String),
    /// Placeholder pattern failed to compile
    #[error("invalid placeholder pattern: {0}")]
    Pattern(String),
}

/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// `{{ env.VAR | default("fallback") }}` substitutes the fallback when the
/// variable is unset. Comment lines are passed through unchanged.
pub fn expand_env(input: &str) -> Result<String, EnvError> {
    let re = PLACEHOLDER.as_ref().map_err(|e| EnvError::Pattern(e.to_string()))?;
    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut last_end = 0;
        for captures in re.captures_iter(line) {
            let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
                continue;
            };

            output.push_str(&line[last_end..whole.start()]);
            output.push_str(&resolve(key.as_str(), captures.get(2).map(|m| m.as_str()))?);
            last_end = whole.end();
        }
        output.push_str(&line[last_end..]);
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

fn resolve(key: &str, fallback: Option<&str>) -> Result<String, EnvError> {
    let Some(name) = key.strip_prefix("env.").filter(|name| !name.is_empty() && !name.contains('.')) else {
        return Err(EnvError::UnsupportedScope(key.to_owned()));
    };

    match (std::env::var(name), fallback) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(fallback)) => Ok(fallback.to_owned()),
        (Err(_), None) => Err(EnvError::NotFound(name.to_owned())),
    }
}
