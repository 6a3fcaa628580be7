//! Turns streamed chunks into per-chunk response snapshots
//!
//! One aggregator serves exactly one subscription. It remembers the role of
//! each response id, because only the first delta of a response carries it,
//! and buffers tool-call fragments until their choice finishes.

use std::collections::{BTreeMap, HashMap};

use crate::convert::build_generation;
use crate::error::ChatError;
use crate::protocol::{
    ChatCompletionChunk, ChatCompletionMessage, Choice, FunctionCall, ToolCallDelta, WireToolCall, function_type,
};
use crate::types::{ChatResponse, ResponseMetadata, Usage};
use crate::usage::cumulative_usage;

#[derive(Debug, Default, Clone)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Debug, Default, Clone)]
struct LastSeen {
    id: String,
    model: String,
    created: i64,
}

/// Per-subscription chunk aggregator
#[derive(Debug, Default)]
pub struct ChunkAggregator {
    roles: HashMap<String, String>,
    pending: BTreeMap<u32, BTreeMap<u32, PendingToolCall>>,
    last_seen: LastSeen,
    last_usage: Option<Usage>,
}

impl ChunkAggregator {
    /// Fresh aggregator for a new subscription
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert one chunk into a response snapshot
    ///
    /// Chunks without choices produce nothing. A chunk that cannot be
    /// converted produces an empty response instead of ending the stream.
    /// `previous` is the last response of the preceding turn, used for
    /// cumulative usage.
    pub fn aggregate(&mut self, chunk: ChatCompletionChunk, previous: Option<&ChatResponse>) -> Option<ChatResponse> {
        if chunk.choices.is_empty() {
            return None;
        }

        match self.convert(chunk, previous) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::error!(error = %e, "failed to convert stream chunk");
                Some(ChatResponse::empty())
            }
        }
    }

    /// Release tool calls still buffered when the stream ends
    ///
    /// The flushed response carries the last usage reported in this turn.
    /// Choices whose fragments never completed are dropped.
    pub fn finish(&mut self, previous: Option<&ChatResponse>) -> Option<ChatResponse> {
        if self.pending.is_empty() {
            return None;
        }

        let role = self.role_of(&self.last_seen.id);
        let mut generations = Vec::with_capacity(self.pending.len());
        for (index, calls) in std::mem::take(&mut self.pending) {
            let tool_calls = match release(&calls) {
                Ok(tool_calls) => tool_calls,
                Err(e) => {
                    tracing::error!(choice = index, error = %e, "dropping incomplete tool call at end of stream");
                    continue;
                }
            };
            let choice = Choice {
                index,
                message: ChatCompletionMessage {
                    role: role.clone(),
                    content: None,
                    name: None,
                    tool_call_id: None,
                    tool_calls: Some(tool_calls),
                },
                finish_reason: Some("tool_calls".to_owned()),
            };
            generations.push(build_generation(choice, &self.last_seen.id, &role, None));
        }

        if generations.is_empty() {
            return Some(ChatResponse::empty());
        }

        Some(ChatResponse::new(
            generations,
            ResponseMetadata {
                id: self.last_seen.id.clone(),
                model: self.last_seen.model.clone(),
                created: self.last_seen.created,
                usage: cumulative_usage(self.last_usage, previous),
            },
        ))
    }

    fn convert(
        &mut self,
        chunk: ChatCompletionChunk,
        previous: Option<&ChatResponse>,
    ) -> Result<ChatResponse, ChatError> {
        let id = chunk.id;
        self.last_seen = LastSeen {
            id: id.clone(),
            model: chunk.model.unwrap_or_default(),
            created: chunk.created.unwrap_or_default(),
        };

        // Usage of the chunk is read from its last choice
        let usage = chunk.choices.last().and_then(|choice| choice.usage);
        if usage.is_some() {
            self.last_usage = usage;
        }

        for choice in &chunk.choices {
            if let Some(role) = &choice.delta.role {
                self.roles.insert(id.clone(), role.clone());
            }
            if let Some(fragments) = &choice.delta.tool_calls {
                self.buffer(choice.index, fragments);
            }
        }

        // Pending calls stay buffered until every finished choice converts
        let mut released = Vec::new();
        for choice in chunk.choices.iter().filter(|choice| choice.finish_reason.is_some()) {
            if let Some(calls) = self.pending.get(&choice.index) {
                match release(calls) {
                    Ok(tool_calls) => released.push((choice.index, tool_calls)),
                    Err(e) => {
                        self.pending.remove(&choice.index);
                        return Err(e);
                    }
                }
            }
        }

        let role = self.role_of(&id);
        let mut generations = Vec::with_capacity(chunk.choices.len());
        for choice in chunk.choices {
            let tool_calls = released
                .iter()
                .position(|(index, _)| *index == choice.index)
                .map(|at| released.swap_remove(at).1);
            if choice.finish_reason.is_some() {
                self.pending.remove(&choice.index);
            }

            let synthetic = Choice {
                index: choice.index,
                message: ChatCompletionMessage {
                    role: role.clone(),
                    content: choice.delta.content,
                    name: None,
                    tool_call_id: None,
                    tool_calls,
                },
                finish_reason: choice.finish_reason,
            };
            generations.push(build_generation(synthetic, &id, &role, None));
        }

        Ok(ChatResponse::new(
            generations,
            ResponseMetadata {
                id,
                model: self.last_seen.model.clone(),
                created: self.last_seen.created,
                usage: cumulative_usage(usage, previous),
            },
        ))
    }

    fn role_of(&self, id: &str) -> String {
        self.roles.get(id).cloned().unwrap_or_default()
    }

    fn buffer(&mut self, choice_index: u32, fragments: &[ToolCallDelta]) {
        let calls = self.pending.entry(choice_index).or_default();
        for fragment in fragments {
            let call = calls.entry(fragment.index).or_default();
            if let Some(id) = &fragment.id {
                call.id.clone_from(id);
            }
            if let Some(function) = &fragment.function {
                if let Some(name) = &function.name {
                    call.name.clone_from(name);
                }
                if let Some(arguments) = &function.arguments {
                    call.arguments.push_str(arguments);
                }
            }
        }
    }
}

fn release(calls: &BTreeMap<u32, PendingToolCall>) -> Result<Vec<WireToolCall>, ChatError> {
    calls
        .values()
        .map(|call| {
            if call.id.is_empty() || call.name.is_empty() {
                return Err(ChatError::Streaming(format!(
                    "incomplete tool call in stream (id: '{}', name: '{}')",
                    call.id, call.name
                )));
            }
            Ok(WireToolCall {
                id: call.id.clone(),
                tool_type: function_type(),
                function: FunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            })
        })
        .collect()
}
