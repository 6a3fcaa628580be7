//! Canonical conversation types shared by the request builder and both loops

pub mod message;
pub mod options;
pub mod response;

pub use message::{AssistantMessage, Message, Metadata, Prompt, ToolCall, ToolResponse, ToolResponseMessage};
pub use options::{ChatOptions, ToolChoice};
pub use response::{ChatResponse, Generation, ResponseMetadata, Usage};
