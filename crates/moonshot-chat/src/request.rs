//! Builds concrete wire requests from a conversation

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::DEFAULT_CHAT_MODEL;
use crate::convert::message_to_wire;
use crate::error::ChatError;
use crate::protocol::{ChatCompletionRequest, FunctionDefinition, FunctionTool, function_type};
use crate::tool::ToolCallingManager;
use crate::types::{ChatOptions, Message, Prompt, ToolChoice};

/// Merges options and serializes conversations into requests
#[derive(Clone)]
pub struct RequestBuilder {
    defaults: ChatOptions,
    tool_calling_manager: Arc<dyn ToolCallingManager>,
}

impl RequestBuilder {
    /// Builder over the process-wide default options
    pub fn new(defaults: ChatOptions, tool_calling_manager: Arc<dyn ToolCallingManager>) -> Self {
        Self {
            defaults,
            tool_calling_manager,
        }
    }

    /// Default options every call inherits
    pub const fn defaults(&self) -> &ChatOptions {
        &self.defaults
    }

    /// Prompt with its options merged over the defaults
    pub fn merge(&self, prompt: &Prompt) -> Result<Prompt, ChatError> {
        let options = ChatOptions::merge(&prompt.options, &self.defaults);
        options.validate_tool_callbacks()?;
        Ok(Prompt {
            messages: prompt.messages.clone(),
            options,
        })
    }

    /// Serialize a merged prompt into a wire request
    pub fn build(&self, prompt: &Prompt, stream: bool) -> Result<ChatCompletionRequest, ChatError> {
        let mut messages = Vec::with_capacity(prompt.messages.len());
        let mut call_ids = BTreeSet::new();
        for message in &prompt.messages {
            messages.extend(message_to_wire(message)?);
            match message {
                Message::Assistant(assistant) => {
                    call_ids.extend(assistant.tool_calls.iter().map(|call| call.id.as_str()));
                }
                Message::Tool(tool) => {
                    if let Some(orphan) = tool.responses.iter().find(|r| !call_ids.contains(r.id.as_str())) {
                        return Err(ChatError::Validation(format!(
                            "tool response '{}' does not answer any prior tool call",
                            orphan.id
                        )));
                    }
                }
                _ => {}
            }
        }

        let options = &prompt.options;
        let definitions = self.tool_calling_manager.resolve_tool_definitions(options)?;
        let tools = (!definitions.is_empty()).then(|| {
            definitions
                .into_iter()
                .map(|definition| FunctionTool {
                    tool_type: function_type(),
                    function: FunctionDefinition {
                        name: definition.name,
                        description: Some(definition.description),
                        parameters: Some(definition.input_schema),
                    },
                })
                .collect()
        });

        Ok(ChatCompletionRequest {
            model: options.model.clone().unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_owned()),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            n: options.n,
            presence_penalty: options.presence_penalty,
            frequency_penalty: options.frequency_penalty,
            stop: options.stop.clone(),
            stream,
            tools,
            tool_choice: options.tool_choice.as_ref().map(ToolChoice::to_wire),
            user: options.user.clone(),
        })
    }
}
