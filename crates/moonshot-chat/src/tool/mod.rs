//! Tool definitions, callbacks and the tool calling capability used by the loops
//!
//! Tool callbacks are synchronous. The conversation loops hand every tool round
//! to tokio's blocking pool so a slow tool never stalls the async runtime.

mod eligibility;
mod manager;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use eligibility::{DefaultToolExecutionEligibility, ToolExecutionEligibility};
pub use manager::{DefaultToolCallingManager, StaticToolCallbackResolver, ToolCallbackResolver};

use crate::error::ChatError;
use crate::types::{AssistantMessage, ChatOptions, ChatResponse, Generation, Message, Metadata, Prompt};

/// Arbitrary key/value context handed to every tool invocation
pub type ToolContext = serde_json::Map<String, serde_json::Value>;

/// Finish reason of generations built from tool output
pub const RETURN_DIRECT_FINISH_REASON: &str = "returnDirect";

/// Description of a tool advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Function name the model uses to call the tool
    pub name: String,
    /// What the tool does
    pub description: String,
    /// JSON Schema of the arguments
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    /// Definition from its parts
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Executable tool implementation
pub trait ToolCallback: Send + Sync {
    /// Definition advertised to the model
    fn definition(&self) -> &ToolDefinition;

    /// Whether the tool output goes straight back to the caller
    fn return_direct(&self) -> bool {
        false
    }

    /// Run the tool with JSON-encoded arguments
    fn call(&self, arguments: &str, context: &ToolContext) -> Result<String, ChatError>;
}

type ToolFn = dyn Fn(&str, &ToolContext) -> Result<String, ChatError> + Send + Sync;

/// Tool backed by a closure
pub struct FunctionToolCallback {
    definition: ToolDefinition,
    return_direct: bool,
    function: Box<ToolFn>,
}

impl FunctionToolCallback {
    /// Wrap a closure as a tool
    pub fn new<F>(definition: ToolDefinition, function: F) -> Self
    where
        F: Fn(&str, &ToolContext) -> Result<String, ChatError> + Send + Sync + 'static,
    {
        Self {
            definition,
            return_direct: false,
            function: Box::new(function),
        }
    }

    /// Return tool output to the caller instead of feeding it back to the model
    #[must_use]
    pub const fn with_return_direct(mut self, return_direct: bool) -> Self {
        self.return_direct = return_direct;
        self
    }
}

impl fmt::Debug for FunctionToolCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionToolCallback")
            .field("definition", &self.definition)
            .field("return_direct", &self.return_direct)
            .finish_non_exhaustive()
    }
}

impl ToolCallback for FunctionToolCallback {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn return_direct(&self) -> bool {
        self.return_direct
    }

    fn call(&self, arguments: &str, context: &ToolContext) -> Result<String, ChatError> {
        (self.function)(arguments, context)
    }
}

/// Outcome of one tool round
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecutionResult {
    /// Prompt messages, the assistant tool-call message, then the tool responses
    pub conversation_history: Vec<Message>,
    /// Whether the tool output is the final answer
    pub return_direct: bool,
}

impl ToolExecutionResult {
    /// One generation per tool response, carrying the raw tool output
    pub fn build_generations(&self) -> Vec<Generation> {
        let Some(Message::Tool(tool)) = self.conversation_history.last() else {
            return Vec::new();
        };

        tool.responses
            .iter()
            .map(|response| {
                let mut metadata = Metadata::new();
                metadata.insert("toolId".to_owned(), response.id.clone().into());
                metadata.insert("toolName".to_owned(), response.name.clone().into());
                Generation::new(
                    AssistantMessage {
                        content: Some(response.response_data.clone()),
                        tool_calls: Vec::new(),
                        metadata,
                    },
                    RETURN_DIRECT_FINISH_REASON,
                )
            })
            .collect()
    }
}

/// Resolves tools for requests and executes the calls a model asks for
pub trait ToolCallingManager: Send + Sync {
    /// Definitions to advertise for the given options
    fn resolve_tool_definitions(&self, options: &ChatOptions) -> Result<Vec<ToolDefinition>, ChatError>;

    /// Run the tool calls of `response` and extend the conversation with the results
    fn execute_tool_calls(&self, prompt: &Prompt, response: &ChatResponse) -> Result<ToolExecutionResult, ChatError>;
}
