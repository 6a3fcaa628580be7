//! Observability boundary around one top-level chat call
//!
//! A handle is opened once per `call` or `stream` invocation, no matter how
//! many tool rounds follow, and is closed exactly once.

use tracing::Span;
use tracing::field::Empty;

use crate::error::ChatError;
use crate::types::ChatResponse;

/// What is being observed
#[derive(Debug, Clone)]
pub struct ObservationContext {
    /// Provider label, e.g. `moonshot`
    pub provider: &'static str,
    /// Operation label, e.g. `chat`
    pub operation: &'static str,
    /// Model requested after option merging
    pub request_model: Option<String>,
    /// Whether the call is streamed
    pub streaming: bool,
    /// Ambient span captured when the call started
    pub parent: Span,
}

/// Starts observations
pub trait ObservationSink: Send + Sync {
    /// Open an observation for one top-level call
    fn start(&self, context: ObservationContext) -> Box<dyn ObservationHandle>;
}

/// An open observation
pub trait ObservationHandle: Send {
    /// Record the final response
    fn record_result(&mut self, response: &ChatResponse);

    /// Record the failure that ended the call
    fn record_error(&mut self, error: &ChatError);

    /// Close the observation
    fn close(self: Box<Self>);

    /// Span that work belonging to this observation should run in
    fn span(&self) -> Span {
        Span::none()
    }
}

/// Observation sink that opens a `chat` tracing span per call
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservationSink;

impl ObservationSink for TracingObservationSink {
    fn start(&self, context: ObservationContext) -> Box<dyn ObservationHandle> {
        let span = tracing::info_span!(
            parent: &context.parent,
            "chat",
            gen_ai.operation.name = context.operation,
            gen_ai.system = context.provider,
            gen_ai.request.model = Empty,
            gen_ai.response.id = Empty,
            gen_ai.response.model = Empty,
            gen_ai.usage.input_tokens = Empty,
            gen_ai.usage.output_tokens = Empty,
            gen_ai.usage.total_tokens = Empty,
            streaming = context.streaming,
            error.kind = Empty,
            error.message = Empty,
        );
        if let Some(model) = &context.request_model {
            span.record("gen_ai.request.model", model.as_str());
        }
        Box::new(TracingObservationHandle { span })
    }
}

struct TracingObservationHandle {
    span: Span,
}

impl ObservationHandle for TracingObservationHandle {
    fn record_result(&mut self, response: &ChatResponse) {
        let usage = response.usage();
        self.span.record("gen_ai.response.id", response.metadata.id.as_str());
        self.span.record("gen_ai.response.model", response.metadata.model.as_str());
        self.span.record("gen_ai.usage.input_tokens", usage.prompt_tokens);
        self.span.record("gen_ai.usage.output_tokens", usage.completion_tokens);
        self.span.record("gen_ai.usage.total_tokens", usage.total_tokens);
    }

    fn record_error(&mut self, error: &ChatError) {
        self.span.record("error.kind", error.kind());
        self.span.record("error.message", tracing::field::display(error));
    }

    fn close(self: Box<Self>) {
        tracing::debug!(parent: &self.span, "chat observation closed");
    }

    fn span(&self) -> Span {
        self.span.clone()
    }
}

/// Observation sink that records nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObservationSink;

impl ObservationSink for NoopObservationSink {
    fn start(&self, _context: ObservationContext) -> Box<dyn ObservationHandle> {
        Box::new(NoopObservationHandle)
    }
}

struct NoopObservationHandle;

impl ObservationHandle for NoopObservationHandle {
    fn record_result(&mut self, _response: &ChatResponse) {}

    fn record_error(&mut self, _error: &ChatError) {}

    fn close(self: Box<Self>) {}
}

/// Guard that closes its handle exactly once
///
/// Dropping an unfinished guard records [`ChatError::Cancelled`].
pub(crate) struct Observation {
    handle: Option<Box<dyn ObservationHandle>>,
    span: Span,
}

impl Observation {
    pub(crate) fn start(sink: &dyn ObservationSink, context: ObservationContext) -> Self {
        let handle = sink.start(context);
        let span = handle.span();
        Self {
            handle: Some(handle),
            span,
        }
    }

    pub(crate) fn span(&self) -> Span {
        self.span.clone()
    }

    pub(crate) fn succeed(mut self, response: &ChatResponse) {
        if let Some(mut handle) = self.handle.take() {
            handle.record_result(response);
            handle.close();
        }
    }

    pub(crate) fn fail(mut self, error: &ChatError) {
        if let Some(mut handle) = self.handle.take() {
            handle.record_error(error);
            handle.close();
        }
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.record_error(&ChatError::Cancelled);
            handle.close();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    fn context() -> ObservationContext {
        ObservationContext {
            provider: "moonshot",
            operation: "chat",
            request_model: Some("moonshot-v1-8k".to_owned()),
            streaming: false,
            parent: Span::none(),
        }
    }

    #[test]
    fn success_closes_once() {
        let sink = RecordingSink::default();
        Observation::start(&sink, context()).succeed(&ChatResponse::empty());

        let recorded = sink.snapshot();
        assert_eq!(recorded.started, 1);
        assert_eq!(recorded.closed, 1);
        assert_eq!(recorded.results.len(), 1);
        assert!(recorded.errors.is_empty());
        assert_eq!(recorded.request_model.as_deref(), Some("moonshot-v1-8k"));
    }

    #[test]
    fn failure_records_error_then_closes_once() {
        let sink = RecordingSink::default();
        Observation::start(&sink, context()).fail(&ChatError::fatal("bad request"));

        let recorded = sink.snapshot();
        assert_eq!(recorded.closed, 1);
        assert_eq!(recorded.errors, vec!["transport_error"]);
    }

    #[test]
    fn dropping_unfinished_observation_records_cancellation() {
        let sink = RecordingSink::default();
        drop(Observation::start(&sink, context()));

        let recorded = sink.snapshot();
        assert_eq!(recorded.closed, 1);
        assert_eq!(recorded.errors, vec!["cancelled"]);
    }

    #[test]
    fn tracing_sink_exposes_its_span() {
        let handle = TracingObservationSink.start(context());
        let _ = handle.span();
        handle.close();
    }
}
