use std::sync::Arc;

use indexmap::IndexMap;

use super::{ToolCallback, ToolCallingManager, ToolDefinition, ToolExecutionResult};
use crate::error::ChatError;
use crate::types::{ChatOptions, ChatResponse, Message, Prompt, ToolResponse, ToolResponseMessage};

/// Looks up tool implementations by name
pub trait ToolCallbackResolver: Send + Sync {
    /// Callback registered under `name`, if any
    fn resolve(&self, name: &str) -> Option<Arc<dyn ToolCallback>>;
}

/// Fixed name to callback map
#[derive(Default)]
pub struct StaticToolCallbackResolver {
    callbacks: IndexMap<String, Arc<dyn ToolCallback>>,
}

impl StaticToolCallbackResolver {
    /// Resolver over the given callbacks, keyed by their definition name
    pub fn new(callbacks: impl IntoIterator<Item = Arc<dyn ToolCallback>>) -> Self {
        let mut resolver = Self::default();
        for callback in callbacks {
            resolver.register(callback);
        }
        resolver
    }

    /// Add or replace a callback
    pub fn register(&mut self, callback: Arc<dyn ToolCallback>) {
        self.callbacks.insert(callback.definition().name.clone(), callback);
    }
}

impl ToolCallbackResolver for StaticToolCallbackResolver {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ToolCallback>> {
        self.callbacks.get(name).cloned()
    }
}

/// Tool calling backed by the callbacks in the options and a name resolver
#[derive(Clone)]
pub struct DefaultToolCallingManager {
    resolver: Arc<dyn ToolCallbackResolver>,
}

impl Default for DefaultToolCallingManager {
    fn default() -> Self {
        Self::new(Arc::new(StaticToolCallbackResolver::default()))
    }
}

impl DefaultToolCallingManager {
    /// Manager that resolves tool names through `resolver`
    pub fn new(resolver: Arc<dyn ToolCallbackResolver>) -> Self {
        Self { resolver }
    }

    fn find_callback(&self, options: &ChatOptions, name: &str) -> Option<Arc<dyn ToolCallback>> {
        options
            .callbacks()
            .iter()
            .find(|callback| callback.definition().name == name)
            .cloned()
            .or_else(|| self.resolver.resolve(name))
    }
}

impl ToolCallingManager for DefaultToolCallingManager {
    fn resolve_tool_definitions(&self, options: &ChatOptions) -> Result<Vec<ToolDefinition>, ChatError> {
        let mut definitions: IndexMap<String, ToolDefinition> = IndexMap::new();

        for callback in options.callbacks() {
            let definition = callback.definition();
            definitions
                .entry(definition.name.clone())
                .or_insert_with(|| definition.clone());
        }

        for name in options.tool_names.iter().flatten() {
            if definitions.contains_key(name) {
                continue;
            }
            let callback = self
                .resolver
                .resolve(name)
                .ok_or_else(|| ChatError::Validation(format!("no tool callback registered for '{name}'")))?;
            definitions.insert(name.clone(), callback.definition().clone());
        }

        Ok(definitions.into_values().collect())
    }

    fn execute_tool_calls(&self, prompt: &Prompt, response: &ChatResponse) -> Result<ToolExecutionResult, ChatError> {
        let assistant = response
            .generations
            .iter()
            .map(|generation| &generation.output)
            .find(|output| output.has_tool_calls())
            .ok_or_else(|| ChatError::Validation("no tool call requested by the chat model".to_owned()))?;

        let context = prompt.options.tool_context.clone().unwrap_or_default();
        let mut responses = Vec::with_capacity(assistant.tool_calls.len());
        let mut return_direct = true;

        for call in &assistant.tool_calls {
            let callback = self
                .find_callback(&prompt.options, &call.name)
                .ok_or_else(|| ChatError::ToolExecution(format!("no tool callback found for '{}'", call.name)))?;

            tracing::debug!(tool = %call.name, id = %call.id, "executing tool call");

            let output = callback.call(&call.arguments, &context)?;
            return_direct &= callback.return_direct();

            responses.push(ToolResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                response_data: output,
            });
        }

        let mut conversation_history = prompt.messages.clone();
        conversation_history.push(Message::Assistant(assistant.clone()));
        conversation_history.push(Message::Tool(ToolResponseMessage { responses }));

        Ok(ToolExecutionResult {
            conversation_history,
            return_direct,
        })
    }
}
