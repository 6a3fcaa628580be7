use serde::Deserialize;

/// Chat configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Default request options applied to every call
    #[serde(default)]
    pub options: ChatOptionsConfig,
}

/// Process-wide default request options
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatOptionsConfig {
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Nucleus sampling probability mass
    #[serde(default)]
    pub top_p: Option<f64>,
    /// Maximum completion tokens
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Number of choices to generate
    #[serde(default)]
    pub n: Option<u32>,
    /// Presence penalty
    #[serde(default)]
    pub presence_penalty: Option<f64>,
    /// Frequency penalty
    #[serde(default)]
    pub frequency_penalty: Option<f64>,
    /// Stop sequences
    #[serde(default)]
    pub stop: Option<Vec<String>>,
    /// End-user identifier forwarded to the provider
    #[serde(default)]
    pub user: Option<String>,
    /// Tool selection mode
    #[serde(default)]
    pub tool_choice: Option<ToolChoiceConfig>,
    /// Whether requested tools run inside the conversation loop
    #[serde(default)]
    pub internal_tool_execution_enabled: Option<bool>,
    /// Names of tools enabled for every call
    #[serde(default)]
    pub tool_names: Vec<String>,
}

impl Default for ChatOptionsConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            top_p: None,
            max_tokens: None,
            n: None,
            presence_penalty: None,
            frequency_penalty: None,
            stop: None,
            user: None,
            tool_choice: None,
            internal_tool_execution_enabled: None,
            tool_names: Vec::new(),
        }
    }
}

/// Tool selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoiceConfig {
    /// Never call tools
    None,
    /// Let the model decide
    Auto,
    /// Always call a tool
    Required,
}

fn default_model() -> String {
    "moonshot-v1-8k".to_owned()
}

#[allow(clippy::missing_const_for_fn)]
fn default_temperature() -> f64 {
    0.7
}
