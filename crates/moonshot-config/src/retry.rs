use std::time::Duration;

use serde::Deserialize;

/// Retry behaviour for transient transport failures
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, e.g. `"2s"`
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff: String,
    /// Factor applied to the delay after every retry
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Upper bound for a single delay
    #[serde(default = "default_max_backoff")]
    pub max_backoff: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            multiplier: default_multiplier(),
            max_backoff: default_max_backoff(),
        }
    }
}

impl RetryConfig {
    /// Parsed initial backoff
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid duration string
    pub fn initial_backoff(&self) -> anyhow::Result<Duration> {
        parse_duration("retry.initial_backoff", &self.initial_backoff)
    }

    /// Parsed maximum backoff
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid duration string
    pub fn max_backoff(&self) -> anyhow::Result<Duration> {
        parse_duration("retry.max_backoff", &self.max_backoff)
    }
}

fn parse_duration(field: &str, raw: &str) -> anyhow::Result<Duration> {
    duration_str::parse(raw).map_err(|e| anyhow::anyhow!("invalid {field} '{raw}': {e}"))
}

const fn default_max_attempts() -> u32 {
    10
}

fn default_initial_backoff() -> String {
    "2s".to_owned()
}

#[allow(clippy::missing_const_for_fn)]
fn default_multiplier() -> f64 {
    5.0
}

fn default_max_backoff() -> String {
    "180s".to_owned()
}
