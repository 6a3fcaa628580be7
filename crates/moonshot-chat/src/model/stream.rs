//! Streaming conversation loop
//!
//! Each `stream` call spawns one driver task that owns the observation and
//! pushes response snapshots into a bounded channel. Tool rounds open nested
//! turns whose snapshots are spliced into the output in place of the
//! snapshot that requested them. Dropping the returned stream cancels the
//! driver.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt, future, stream};
use tokio::sync::mpsc;
use tracing::{Instrument, Span};

use super::{ChatModel, ChatModelInner, observation_context};
use crate::aggregator::ChunkAggregator;
use crate::error::ChatError;
use crate::message_aggregator::MessageAggregator;
use crate::observation::Observation;
use crate::transport::ChunkStream;
use crate::types::{ChatResponse, Prompt};

/// Snapshots of a streamed conversation
pub type ChatResponseStream = Pin<Box<dyn Stream<Item = Result<ChatResponse, ChatError>> + Send>>;

/// Snapshots buffered between the driver and the consumer
const CHANNEL_CAPACITY: usize = 32;

type Sender = mpsc::Sender<Result<ChatResponse, ChatError>>;

impl ChatModel {
    /// Stream a conversation
    ///
    /// Nothing is sent until the stream is first polled. Every element is the
    /// snapshot of one chunk; usage on each snapshot is cumulative across
    /// tool rounds.
    pub fn stream(&self, prompt: impl Into<Prompt>) -> ChatResponseStream {
        let inner = Arc::clone(&self.inner);
        let prompt = prompt.into();
        let parent = Span::current();

        Box::pin(stream::once(async move { open(inner, &prompt, parent) }).flatten())
    }
}

fn open(inner: Arc<ChatModelInner>, prompt: &Prompt, parent: Span) -> ChatResponseStream {
    let prompt = match inner.requests.merge(prompt) {
        Ok(prompt) => prompt,
        Err(e) => return Box::pin(stream::once(future::ready(Err(e)))),
    };

    let observation = Observation::start(inner.observation.as_ref(), observation_context(&prompt, true, parent));
    let span = observation.span();
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(run(inner, tx, observation, prompt).instrument(span));

    Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}

async fn run(inner: Arc<ChatModelInner>, tx: Sender, observation: Observation, prompt: Prompt) {
    let mut messages = MessageAggregator::new();

    let outcome = tokio::select! {
        biased;
        () = tx.closed() => Err(ChatError::Cancelled),
        result = drive(&inner, &tx, prompt, &mut messages) => result,
    };

    match outcome {
        Ok(()) => observation.succeed(&messages.finish()),
        Err(ChatError::Cancelled) => {
            tracing::debug!("chat stream cancelled by consumer");
            drop(observation);
        }
        Err(e) => {
            observation.fail(&e);
            let _ = tx.send(Err(e)).await;
        }
    }
}

/// One turn of the conversation: a prompt and the chunks answering it
struct Turn {
    prompt: Prompt,
    chunks: ChunkStream,
    aggregator: ChunkAggregator,
    previous: Option<ChatResponse>,
    exhausted: bool,
}

impl Turn {
    async fn open(inner: &ChatModelInner, prompt: Prompt, previous: Option<ChatResponse>) -> Result<Self, ChatError> {
        let request = inner.requests.build(&prompt, true)?;
        let chunks = inner.transport.chat_completion_stream(&request).await?;
        Ok(Self {
            prompt,
            chunks,
            aggregator: ChunkAggregator::new(),
            previous,
            exhausted: false,
        })
    }

    /// Next snapshot of this turn, `None` once the turn is over
    async fn next_response(&mut self) -> Result<Option<ChatResponse>, ChatError> {
        while !self.exhausted {
            match self.chunks.next().await {
                Some(chunk) => {
                    if let Some(response) = self.aggregator.aggregate(chunk?, self.previous.as_ref()) {
                        return Ok(Some(response));
                    }
                }
                None => self.exhausted = true,
            }
        }
        Ok(self.aggregator.finish(self.previous.as_ref()))
    }
}

async fn drive(
    inner: &ChatModelInner,
    tx: &Sender,
    prompt: Prompt,
    messages: &mut MessageAggregator,
) -> Result<(), ChatError> {
    let mut turns = vec![Turn::open(inner, prompt, None).await?];

    while let Some(turn) = turns.last_mut() {
        let Some(response) = turn.next_response().await? else {
            turns.pop();
            continue;
        };

        if !inner
            .eligibility
            .is_tool_execution_required(&turn.prompt.options, &response)
        {
            emit(tx, messages, response).await?;
            continue;
        }

        let result = inner.execute_tools(&turn.prompt, &response).await?;
        if result.return_direct {
            let direct = ChatResponse::new(result.build_generations(), response.metadata);
            emit(tx, messages, direct).await?;
            continue;
        }

        let nested = Prompt {
            messages: result.conversation_history,
            options: turn.prompt.options.clone(),
        };
        turns.push(Turn::open(inner, nested, Some(response)).await?);
    }

    Ok(())
}

async fn emit(tx: &Sender, messages: &mut MessageAggregator, response: ChatResponse) -> Result<(), ChatError> {
    messages.push(&response);
    tx.send(Ok(response)).await.map_err(|_| ChatError::Cancelled)
}
