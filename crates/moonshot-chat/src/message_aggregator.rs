//! Coalesces streamed snapshots into one materialized response

use crate::types::{AssistantMessage, ChatResponse, Generation, ResponseMetadata, Usage};

/// Accumulates the snapshots of one streamed conversation
///
/// Only the first generation of each snapshot contributes, mirroring what a
/// caller reading [`ChatResponse::result`] sees.
#[derive(Debug, Default)]
pub struct MessageAggregator {
    text: String,
    saw_text: bool,
    output: AssistantMessage,
    finish_reason: String,
    usage: Usage,
    id: String,
    model: String,
    created: i64,
}

impl MessageAggregator {
    /// Empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one snapshot into the running response
    pub fn push(&mut self, response: &ChatResponse) {
        if self.id.is_empty() && !response.metadata.id.is_empty() {
            self.id.clone_from(&response.metadata.id);
        }
        if self.model.is_empty() && !response.metadata.model.is_empty() {
            self.model.clone_from(&response.metadata.model);
        }
        if self.created == 0 {
            self.created = response.metadata.created;
        }
        if !response.metadata.usage.is_zero() {
            self.usage = response.metadata.usage;
        }

        let Some(generation) = response.result() else {
            return;
        };

        if let Some(text) = &generation.output.content {
            self.text.push_str(text);
            self.saw_text = true;
        }
        self.output
            .tool_calls
            .extend(generation.output.tool_calls.iter().cloned());
        self.output.metadata.extend(
            generation
                .output
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        if !generation.finish_reason.is_empty() {
            self.finish_reason.clone_from(&generation.finish_reason);
        }
    }

    /// The coalesced response
    pub fn finish(self) -> ChatResponse {
        let output = AssistantMessage {
            content: self.saw_text.then_some(self.text),
            ..self.output
        };

        ChatResponse::new(
            vec![Generation::new(output, self.finish_reason)],
            ResponseMetadata {
                id: self.id,
                model: self.model,
                created: self.created,
                usage: self.usage,
            },
        )
    }
}
