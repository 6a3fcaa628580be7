use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::tool::{ToolCallback, ToolContext};

/// How the model may pick tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// Never call tools
    None,
    /// Let the model decide
    Auto,
    /// Force at least one tool call
    Required,
    /// Force a call to the named function
    Function(String),
}

impl ToolChoice {
    /// Wire representation used in the request body
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            Self::None => serde_json::Value::from("none"),
            Self::Auto => serde_json::Value::from("auto"),
            Self::Required => serde_json::Value::from("required"),
            Self::Function(name) => serde_json::json!({
                "type": "function",
                "function": { "name": name },
            }),
        }
    }
}

/// Request options for one chat call
///
/// Every field is optional; `None` means "unset" and inherits the model
/// defaults when merged.
#[derive(Clone, Default)]
pub struct ChatOptions {
    /// Model identifier
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    pub top_p: Option<f64>,
    /// Frequency penalty
    pub frequency_penalty: Option<f64>,
    /// Presence penalty
    pub presence_penalty: Option<f64>,
    /// Stop sequences
    pub stop: Option<Vec<String>>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Number of choices to generate
    pub n: Option<u32>,
    /// End-user identifier forwarded to the service
    pub user: Option<String>,
    /// Tool selection mode
    pub tool_choice: Option<ToolChoice>,
    /// Whether tool calls are executed by the conversation loop
    pub internal_tool_execution_enabled: Option<bool>,
    /// Names of tools resolved through the tool registry
    pub tool_names: Option<BTreeSet<String>>,
    /// Tool implementations supplied directly
    pub tool_callbacks: Option<Vec<Arc<dyn ToolCallback>>>,
    /// Context handed to every tool invocation
    pub tool_context: Option<ToolContext>,
}

impl std::fmt::Debug for ChatOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOptions")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("frequency_penalty", &self.frequency_penalty)
            .field("presence_penalty", &self.presence_penalty)
            .field("stop", &self.stop)
            .field("max_tokens", &self.max_tokens)
            .field("n", &self.n)
            .field("user", &self.user)
            .field("tool_choice", &self.tool_choice)
            .field("internal_tool_execution_enabled", &self.internal_tool_execution_enabled)
            .field("tool_names", &self.tool_names)
            .field(
                "tool_callbacks",
                &self
                    .tool_callbacks
                    .as_ref()
                    .map(|callbacks| callbacks.iter().map(|c| c.definition().name.clone()).collect::<Vec<_>>()),
            )
            .field("tool_context", &self.tool_context)
            .finish()
    }
}

impl ChatOptions {
    /// Set the model identifier
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum number of generated tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enable or disable tool execution inside the conversation loop
    #[must_use]
    pub fn with_internal_tool_execution(mut self, enabled: bool) -> Self {
        self.internal_tool_execution_enabled = Some(enabled);
        self
    }

    /// Add a tool name to resolve through the registry
    #[must_use]
    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_names.get_or_insert_with(BTreeSet::new).insert(name.into());
        self
    }

    /// Add a tool implementation
    #[must_use]
    pub fn with_tool_callback(mut self, callback: Arc<dyn ToolCallback>) -> Self {
        self.tool_callbacks.get_or_insert_with(Vec::new).push(callback);
        self
    }

    /// Add an entry to the tool context
    #[must_use]
    pub fn with_tool_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.tool_context.get_or_insert_with(ToolContext::new).insert(key.into(), value);
        self
    }

    /// Whether the loop should execute tool calls itself (defaults to `true`)
    pub fn is_internal_tool_execution_enabled(&self) -> bool {
        self.internal_tool_execution_enabled.unwrap_or(true)
    }

    /// Tool callbacks, empty when unset
    pub fn callbacks(&self) -> &[Arc<dyn ToolCallback>] {
        self.tool_callbacks.as_deref().unwrap_or_default()
    }

    /// Merge per-call options over process-wide defaults
    ///
    /// Scalars set on `runtime` win. Tool names, callbacks and context are
    /// unioned with the defaults; on a name or key conflict the runtime entry
    /// wins. Duplicate callback names within one side are kept so that
    /// `validate_tool_callbacks` still rejects them. An unset collection on
    /// `runtime` inherits the default as-is.
    pub fn merge(runtime: &Self, defaults: &Self) -> Self {
        Self {
            model: runtime.model.clone().or_else(|| defaults.model.clone()),
            temperature: runtime.temperature.or(defaults.temperature),
            top_p: runtime.top_p.or(defaults.top_p),
            frequency_penalty: runtime.frequency_penalty.or(defaults.frequency_penalty),
            presence_penalty: runtime.presence_penalty.or(defaults.presence_penalty),
            stop: runtime.stop.clone().or_else(|| defaults.stop.clone()),
            max_tokens: runtime.max_tokens.or(defaults.max_tokens),
            n: runtime.n.or(defaults.n),
            user: runtime.user.clone().or_else(|| defaults.user.clone()),
            tool_choice: runtime.tool_choice.clone().or_else(|| defaults.tool_choice.clone()),
            internal_tool_execution_enabled: runtime
                .internal_tool_execution_enabled
                .or(defaults.internal_tool_execution_enabled),
            tool_names: union_with(runtime.tool_names.as_ref(), defaults.tool_names.as_ref(), |r, d| {
                r.union(d).cloned().collect()
            }),
            tool_callbacks: union_with(runtime.tool_callbacks.as_ref(), defaults.tool_callbacks.as_ref(), |r, d| {
                let overridden: BTreeSet<&str> = r.iter().map(|c| c.definition().name.as_str()).collect();
                r.iter()
                    .chain(d.iter().filter(|c| !overridden.contains(c.definition().name.as_str())))
                    .cloned()
                    .collect()
            }),
            tool_context: union_with(runtime.tool_context.as_ref(), defaults.tool_context.as_ref(), |r, d| {
                let mut merged = d.clone();
                merged.extend(r.iter().map(|(k, v)| (k.clone(), v.clone())));
                merged
            }),
        }
    }

    /// Reject callback lists that register the same tool name twice
    pub fn validate_tool_callbacks(&self) -> Result<(), ChatError> {
        let mut seen = BTreeSet::new();
        for callback in self.callbacks() {
            let name = &callback.definition().name;
            if !seen.insert(name.as_str()) {
                return Err(ChatError::Validation(format!(
                    "multiple tool callbacks registered under the name '{name}'"
                )));
            }
        }
        Ok(())
    }
}

fn union_with<T: Clone>(runtime: Option<&T>, defaults: Option<&T>, union: impl FnOnce(&T, &T) -> T) -> Option<T> {
    match (runtime, defaults) {
        (Some(r), Some(d)) => Some(union(r, d)),
        (Some(r), None) => Some(r.clone()),
        (None, d) => d.cloned(),
    }
}
