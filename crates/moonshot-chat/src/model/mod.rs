//! Chat model: the synchronous and streaming conversation loops

mod stream;

#[cfg(test)]
mod mock;

use std::sync::Arc;

use tracing::{Instrument, Span};

pub use stream::ChatResponseStream;

use crate::convert::to_chat_response;
use crate::error::ChatError;
use crate::observation::{Observation, ObservationContext, ObservationSink, TracingObservationSink};
use crate::request::RequestBuilder;
use crate::retry::RetryPolicy;
use crate::tool::{
    DefaultToolCallingManager, DefaultToolExecutionEligibility, ToolCallingManager, ToolExecutionEligibility,
    ToolExecutionResult,
};
use crate::transport::ChatTransport;
use crate::types::{ChatOptions, ChatResponse, Prompt};
use crate::{DEFAULT_CHAT_MODEL, DEFAULT_TEMPERATURE, PROVIDER_NAME};

/// Tool-calling chat model over a [`ChatTransport`]
#[derive(Clone)]
pub struct ChatModel {
    inner: Arc<ChatModelInner>,
}

struct ChatModelInner {
    transport: Arc<dyn ChatTransport>,
    requests: RequestBuilder,
    tool_calling_manager: Arc<dyn ToolCallingManager>,
    eligibility: Arc<dyn ToolExecutionEligibility>,
    retry: RetryPolicy,
    observation: Arc<dyn ObservationSink>,
}

impl ChatModel {
    /// Start building a model
    pub fn builder() -> ChatModelBuilder {
        ChatModelBuilder::default()
    }

    /// Copy of the default options every call inherits
    pub fn default_options(&self) -> ChatOptions {
        self.inner.requests.defaults().clone()
    }

    /// Run a conversation to completion
    ///
    /// Tool calls requested by the model are executed and fed back until the
    /// model produces a final answer or a tool returns directly. The returned
    /// usage covers every turn.
    pub async fn call(&self, prompt: impl Into<Prompt>) -> Result<ChatResponse, ChatError> {
        let prompt = self.inner.requests.merge(&prompt.into())?;

        let observation = Observation::start(
            self.inner.observation.as_ref(),
            observation_context(&prompt, false, Span::current()),
        );

        match self.inner.run_turns(prompt).instrument(observation.span()).await {
            Ok(response) => {
                observation.succeed(&response);
                Ok(response)
            }
            Err(e) => {
                observation.fail(&e);
                Err(e)
            }
        }
    }
}

impl ChatModelInner {
    async fn run_turns(&self, mut prompt: Prompt) -> Result<ChatResponse, ChatError> {
        let mut previous: Option<ChatResponse> = None;

        loop {
            let request = self.requests.build(&prompt, false)?;
            let completion = self
                .retry
                .execute(|| self.transport.chat_completion(&request))
                .await?;
            let response = to_chat_response(completion, previous.as_ref());

            if !self
                .eligibility
                .is_tool_execution_required(&prompt.options, &response)
            {
                return Ok(response);
            }

            let result = self.execute_tools(&prompt, &response).await?;
            if result.return_direct {
                return Ok(ChatResponse::new(result.build_generations(), response.metadata));
            }

            prompt = Prompt {
                messages: result.conversation_history,
                options: prompt.options,
            };
            previous = Some(response);
        }
    }

    /// Run one tool round on the blocking pool
    async fn execute_tools(&self, prompt: &Prompt, response: &ChatResponse) -> Result<ToolExecutionResult, ChatError> {
        let manager = Arc::clone(&self.tool_calling_manager);
        let tool_calls = response
            .generations
            .iter()
            .find(|generation| generation.output.has_tool_calls())
            .map_or(0, |generation| generation.output.tool_calls.len());
        let prompt = prompt.clone();
        let response = response.clone();

        let result = tokio::task::spawn_blocking(move || manager.execute_tool_calls(&prompt, &response))
            .await
            .map_err(|e| ChatError::Internal(anyhow::anyhow!("tool execution task failed: {e}")))??;

        tracing::debug!(tool_calls, return_direct = result.return_direct, "tool round completed");

        Ok(result)
    }
}

fn observation_context(prompt: &Prompt, streaming: bool, parent: Span) -> ObservationContext {
    ObservationContext {
        provider: PROVIDER_NAME,
        operation: "chat",
        request_model: Some(
            prompt
                .options
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_owned()),
        ),
        streaming,
        parent,
    }
}

/// Builder for [`ChatModel`]
pub struct ChatModelBuilder {
    transport: Option<Arc<dyn ChatTransport>>,
    default_options: ChatOptions,
    tool_calling_manager: Arc<dyn ToolCallingManager>,
    eligibility: Arc<dyn ToolExecutionEligibility>,
    retry: RetryPolicy,
    observation: Arc<dyn ObservationSink>,
}

impl Default for ChatModelBuilder {
    fn default() -> Self {
        Self {
            transport: None,
            default_options: ChatOptions::default()
                .with_model(DEFAULT_CHAT_MODEL)
                .with_temperature(DEFAULT_TEMPERATURE),
            tool_calling_manager: Arc::new(DefaultToolCallingManager::default()),
            eligibility: Arc::new(DefaultToolExecutionEligibility),
            retry: RetryPolicy::default(),
            observation: Arc::new(TracingObservationSink),
        }
    }
}

impl ChatModelBuilder {
    /// Transport requests are sent through (required)
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn ChatTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the default options
    #[must_use]
    pub fn default_options(mut self, options: ChatOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Replace the tool calling manager
    #[must_use]
    pub fn tool_calling_manager(mut self, manager: Arc<dyn ToolCallingManager>) -> Self {
        self.tool_calling_manager = manager;
        self
    }

    /// Replace the tool execution eligibility policy
    #[must_use]
    pub fn tool_execution_eligibility(mut self, eligibility: Arc<dyn ToolExecutionEligibility>) -> Self {
        self.eligibility = eligibility;
        self
    }

    /// Replace the retry policy
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the observation sink
    #[must_use]
    pub fn observation_sink(mut self, observation: Arc<dyn ObservationSink>) -> Self {
        self.observation = observation;
        self
    }

    /// Build the model
    pub fn build(self) -> Result<ChatModel, ChatError> {
        let transport = self
            .transport
            .ok_or_else(|| ChatError::Validation("a chat transport is required".to_owned()))?;

        Ok(ChatModel {
            inner: Arc::new(ChatModelInner {
                transport,
                requests: RequestBuilder::new(self.default_options, Arc::clone(&self.tool_calling_manager)),
                tool_calling_manager: self.tool_calling_manager,
                eligibility: self.eligibility,
                retry: self.retry,
                observation: self.observation,
            }),
        })
    }
}
