use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use super::message::AssistantMessage;

/// Token usage reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens generated in the completion
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total tokens (prompt + completion)
    #[serde(default)]
    pub total_tokens: u64,
}

impl Usage {
    /// Usage from raw counts
    pub const fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }

    /// Whether every counter is zero
    pub const fn is_zero(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0 && self.total_tokens == 0
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(rhs.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Usage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Response-level bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Response id, empty when the service sent none
    pub id: String,
    /// Model that served the response, empty when unknown
    pub model: String,
    /// Creation time in seconds since the epoch, `0` when unknown
    pub created: i64,
    /// Cumulative usage across every turn of the conversation so far
    pub usage: Usage,
}

/// One candidate completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// The assistant message
    pub output: AssistantMessage,
    /// Why generation stopped, empty when unknown
    pub finish_reason: String,
}

impl Generation {
    /// Generation with the given output and finish reason
    pub fn new(output: AssistantMessage, finish_reason: impl Into<String>) -> Self {
        Self {
            output,
            finish_reason: finish_reason.into(),
        }
    }
}

/// Result of one chat turn (or one streamed snapshot)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Candidate completions; empty is a valid terminal state
    pub generations: Vec<Generation>,
    /// Response metadata
    pub metadata: ResponseMetadata,
}

impl ChatResponse {
    /// Response with the given generations and metadata
    pub const fn new(generations: Vec<Generation>, metadata: ResponseMetadata) -> Self {
        Self { generations, metadata }
    }

    /// Response with no generations and default metadata
    pub fn empty() -> Self {
        Self::default()
    }

    /// First generation, if any
    pub fn result(&self) -> Option<&Generation> {
        self.generations.first()
    }

    /// Text of the first generation
    pub fn text(&self) -> Option<&str> {
        self.result().and_then(|g| g.output.content.as_deref())
    }

    /// Whether any generation asks for tool calls
    pub fn has_tool_calls(&self) -> bool {
        self.generations.iter().any(|g| g.output.has_tool_calls())
    }

    /// Cumulative usage carried by this response
    pub const fn usage(&self) -> Usage {
        self.metadata.usage
    }
}
