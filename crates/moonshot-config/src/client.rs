use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Connection settings for the chat completion endpoint
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent with every request
    pub api_key: SecretString,
    /// Path of the chat completion endpoint, joined onto the base URL
    #[serde(default = "default_completions_path")]
    pub completions_path: String,
    /// Request timeout, e.g. `"60s"`
    #[serde(default)]
    pub timeout: Option<String>,
}

impl ClientConfig {
    /// Parsed base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty or not an absolute URL
    pub fn base_url(&self) -> anyhow::Result<Url> {
        if self.base_url.trim().is_empty() {
            anyhow::bail!("client.base_url must not be empty");
        }
        Url::parse(&self.base_url).map_err(|e| anyhow::anyhow!("invalid client.base_url '{}': {e}", self.base_url))
    }

    /// Parsed request timeout, if one is configured
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is not a valid duration string
    pub fn timeout(&self) -> anyhow::Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|raw| duration_str::parse(raw).map_err(|e| anyhow::anyhow!("invalid client.timeout '{raw}': {e}")))
            .transpose()
    }
}

fn default_base_url() -> String {
    "https://api.moonshot.cn".to_owned()
}

fn default_completions_path() -> String {
    "/v1/chat/completions".to_owned()
}
