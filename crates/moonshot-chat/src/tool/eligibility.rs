use crate::types::{ChatOptions, ChatResponse};

/// Decides whether a response needs a tool round before the conversation ends
pub trait ToolExecutionEligibility: Send + Sync {
    /// `true` when the loop must execute tools before finishing
    fn is_tool_execution_required(&self, options: &ChatOptions, response: &ChatResponse) -> bool;
}

/// Requires tools when internal execution is enabled and any generation has tool calls
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultToolExecutionEligibility;

impl ToolExecutionEligibility for DefaultToolExecutionEligibility {
    fn is_tool_execution_required(&self, options: &ChatOptions, response: &ChatResponse) -> bool {
        options.is_internal_tool_execution_enabled() && response.has_tool_calls()
    }
}

impl<F> ToolExecutionEligibility for F
where
    F: Fn(&ChatOptions, &ChatResponse) -> bool + Send + Sync,
{
    fn is_tool_execution_required(&self, options: &ChatOptions, response: &ChatResponse) -> bool {
        self(options, response)
    }
}
