use serde::{Deserialize, Serialize};

use super::options::ChatOptions;

/// Free-form key/value metadata attached to messages and generations
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// System instruction
    System {
        /// Instruction text
        content: String,
    },
    /// End-user input
    User {
        /// Input text
        content: String,
    },
    /// Model output, possibly requesting tool calls
    Assistant(AssistantMessage),
    /// Results of tool calls requested by a prior assistant message
    Tool(ToolResponseMessage),
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Text carried by this message, if any
    ///
    /// Tool messages have no single text; their payloads live in the responses.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::System { content } | Self::User { content } => Some(content),
            Self::Assistant(message) => message.content.as_deref(),
            Self::Tool(_) => None,
        }
    }
}

impl From<AssistantMessage> for Message {
    fn from(message: AssistantMessage) -> Self {
        Self::Assistant(message)
    }
}

impl From<ToolResponseMessage> for Message {
    fn from(message: ToolResponseMessage) -> Self {
        Self::Tool(message)
    }
}

/// Message produced by the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Generated text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool invocations requested by the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Response bookkeeping (response id, role, choice index, finish reason)
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl AssistantMessage {
    /// Plain text reply
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Reply that only requests tool calls
    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }

    /// Whether the model asked for at least one tool call
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A tool invocation requested by the model
///
/// Identity is the `id`; `arguments` is opaque JSON interpreted by the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier the tool response must echo
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

impl ToolCall {
    /// Build a tool call from raw parts
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Tool results answering the calls of one assistant message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResponseMessage {
    /// One response per answered tool call
    pub responses: Vec<ToolResponse>,
}

/// Output of a single tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Id of the tool call this answers
    pub id: String,
    /// Name of the tool that produced the output
    pub name: String,
    /// Tool output handed back to the model
    pub response_data: String,
}

/// A conversation: ordered messages plus per-call options
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    /// Conversation history, oldest first
    pub messages: Vec<Message>,
    /// Per-call options; unset fields inherit the model defaults
    pub options: ChatOptions,
}

impl Prompt {
    /// Conversation with no per-call options
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            options: ChatOptions::default(),
        }
    }

    /// Replace the per-call options
    #[must_use]
    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Self::new(vec![Message::user(text)])
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Self::new(vec![Message::user(text)])
    }
}
