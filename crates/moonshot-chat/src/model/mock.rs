use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};

use crate::error::ChatError;
use crate::protocol::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionMessage, ChatCompletionRequest, Choice, ChunkChoice, ChunkDelta,
    FunctionCall, FunctionCallDelta, ToolCallDelta, WireToolCall,
};
use crate::transport::{ChatTransport, ChunkStream};
use crate::types::Usage;

/// Transport that replays scripted completions and chunk streams
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    completions: Mutex<VecDeque<Result<ChatCompletion, ChatError>>>,
    streams: Mutex<VecDeque<Vec<Result<ChatCompletionChunk, ChatError>>>>,
    hang_after_stream: bool,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedTransport {
    /// Streams never end on their own once their chunks are consumed
    pub(crate) fn hanging() -> Self {
        Self {
            hang_after_stream: true,
            ..Self::default()
        }
    }

    pub(crate) fn push_completion(&self, completion: Result<ChatCompletion, ChatError>) {
        self.completions.lock().unwrap().push_back(completion);
    }

    pub(crate) fn push_stream(&self, chunks: Vec<Result<ChatCompletionChunk, ChatError>>) {
        self.streams.lock().unwrap().push_back(chunks);
    }

    pub(crate) fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ChatError::fatal("no scripted completion left")))
    }

    async fn chat_completion_stream(&self, request: &ChatCompletionRequest) -> Result<ChunkStream, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        let chunks = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ChatError::fatal("no scripted stream left"))?;

        let scripted = stream::iter(chunks);
        if self.hang_after_stream {
            Ok(Box::pin(scripted.chain(stream::pending())))
        } else {
            Ok(Box::pin(scripted))
        }
    }
}

pub(crate) fn completion(choices: Vec<Choice>, usage: Option<Usage>) -> ChatCompletion {
    ChatCompletion {
        id: Some("cmpl-test".to_owned()),
        object: Some("chat.completion".to_owned()),
        created: Some(1_700_000_000),
        model: Some("moonshot-v1-8k".to_owned()),
        choices,
        usage,
    }
}

pub(crate) fn text_choice(text: &str) -> Choice {
    Choice {
        index: 0,
        message: ChatCompletionMessage::text("assistant", text),
        finish_reason: Some("stop".to_owned()),
    }
}

pub(crate) fn tool_call_choice(id: &str, name: &str, arguments: &str) -> Choice {
    Choice {
        index: 0,
        message: ChatCompletionMessage {
            role: "assistant".to_owned(),
            content: None,
            name: None,
            tool_call_id: None,
            tool_calls: Some(vec![WireToolCall {
                id: id.to_owned(),
                tool_type: "function".to_owned(),
                function: FunctionCall {
                    name: name.to_owned(),
                    arguments: arguments.to_owned(),
                },
            }]),
        },
        finish_reason: Some("tool_calls".to_owned()),
    }
}

pub(crate) fn text_chunk(id: &str, role: Option<&str>, text: &str) -> ChatCompletionChunk {
    chunk(
        id,
        vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                role: role.map(str::to_owned),
                content: Some(text.to_owned()),
                tool_calls: None,
            },
            finish_reason: None,
            usage: None,
        }],
    )
}

pub(crate) fn finish_chunk(id: &str, finish_reason: &str, usage: Usage) -> ChatCompletionChunk {
    chunk(
        id,
        vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta::default(),
            finish_reason: Some(finish_reason.to_owned()),
            usage: Some(usage),
        }],
    )
}

pub(crate) fn tool_call_chunk(id: &str, call_id: &str, name: &str, arguments: &str, usage: Usage) -> ChatCompletionChunk {
    chunk(
        id,
        vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                role: Some("assistant".to_owned()),
                content: None,
                tool_calls: Some(vec![ToolCallDelta {
                    index: 0,
                    id: Some(call_id.to_owned()),
                    tool_type: Some("function".to_owned()),
                    function: Some(FunctionCallDelta {
                        name: Some(name.to_owned()),
                        arguments: Some(arguments.to_owned()),
                    }),
                }]),
            },
            finish_reason: Some("tool_calls".to_owned()),
            usage: Some(usage),
        }],
    )
}

pub(crate) fn chunk(id: &str, choices: Vec<ChunkChoice>) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: id.to_owned(),
        object: Some("chat.completion.chunk".to_owned()),
        created: Some(1_700_000_000),
        model: Some("moonshot-v1-8k".to_owned()),
        choices,
    }
}
