use thiserror::Error;

/// Errors raised while orchestrating a chat conversation
#[derive(Debug, Error)]
pub enum ChatError {
    /// The conversation or options are malformed; never retried
    #[error("validation error: {0}")]
    Validation(String),

    /// The transport failed in a way that may succeed on another attempt
    #[error("transient transport error: {0}")]
    TransientTransport(String),

    /// The transport failed permanently (auth, rejected request, bad payload)
    #[error("transport error: {message}")]
    FatalTransport {
        /// HTTP status returned by the remote service, when there was one
        status: Option<u16>,
        /// Description of the failure
        message: String,
    },

    /// The incremental response channel broke mid-stream
    #[error("streaming error: {0}")]
    Streaming(String),

    /// A tool invocation failed
    #[error("tool execution error: {0}")]
    ToolExecution(String),

    /// The consumer went away before the conversation finished
    #[error("conversation cancelled")]
    Cancelled,

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    /// Whether the retry policy may attempt the operation again
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientTransport(_))
    }

    /// Build a fatal transport error without a status code
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::FatalTransport {
            status: None,
            message: message.into(),
        }
    }

    /// Short machine-readable label, used on observation spans
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::TransientTransport(_) => "transient_transport_error",
            Self::FatalTransport { .. } => "transport_error",
            Self::Streaming(_) => "streaming_error",
            Self::ToolExecution(_) => "tool_execution_error",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal_error",
        }
    }
}
