//! Transport capability the conversation loops send requests through

#[cfg(feature = "http")]
mod http;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

#[cfg(feature = "http")]
pub use http::{DEFAULT_BASE_URL, DEFAULT_COMPLETIONS_PATH, HttpTransport, HttpTransportBuilder};

use crate::error::ChatError;
use crate::protocol::{ChatCompletion, ChatCompletionChunk, ChatCompletionRequest};

/// Lazily produced chunks of one streamed response
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, ChatError>> + Send>>;

/// Sends completion requests to the remote service
///
/// Implementations classify failures: retryable ones as
/// [`ChatError::TransientTransport`], the rest as
/// [`ChatError::FatalTransport`].
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a request and wait for the whole completion
    async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion, ChatError>;

    /// Send a request and receive the completion incrementally
    async fn chat_completion_stream(&self, request: &ChatCompletionRequest) -> Result<ChunkStream, ChatError>;
}
