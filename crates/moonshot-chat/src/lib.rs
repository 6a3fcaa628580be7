//! Conversation orchestration over the Moonshot chat completion API
//!
//! A single call to [`ChatModel::call`] or [`ChatModel::stream`] may issue
//! several requests: whenever the model asks for tools, the tools run and
//! their output is fed back (or returned directly) until the conversation
//! finishes. Token usage is accumulated across every turn.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod aggregator;
pub mod convert;
pub mod error;
pub mod message_aggregator;
pub mod model;
pub mod observation;
pub mod protocol;
pub mod request;
pub mod retry;
pub mod tool;
pub mod transport;
pub mod types;
pub mod usage;

/// Model used when neither the call nor the defaults name one
pub const DEFAULT_CHAT_MODEL: &str = "moonshot-v1-8k";

/// Default sampling temperature of a freshly built model
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Provider label reported on observations
pub const PROVIDER_NAME: &str = "moonshot";

pub use aggregator::ChunkAggregator;
pub use error::ChatError;
pub use message_aggregator::MessageAggregator;
pub use model::{ChatModel, ChatModelBuilder, ChatResponseStream};
pub use observation::{
    NoopObservationSink, ObservationContext, ObservationHandle, ObservationSink, TracingObservationSink,
};
pub use retry::{RetryListener, RetryPolicy};
pub use tool::{
    DefaultToolCallingManager, DefaultToolExecutionEligibility, FunctionToolCallback, StaticToolCallbackResolver,
    ToolCallback, ToolCallbackResolver, ToolCallingManager, ToolContext, ToolDefinition, ToolExecutionEligibility,
    ToolExecutionResult,
};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{ChatTransport, ChunkStream};
pub use types::{
    AssistantMessage, ChatOptions, ChatResponse, Generation, Message, Prompt, ResponseMetadata, ToolCall, ToolChoice,
    ToolResponse, ToolResponseMessage, Usage,
};
pub use usage::cumulative_usage;
