#![allow(dead_code)]

pub mod mock_moonshot;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use moonshot_chat::{
    ChatError, ChatModel, ChatOptions, FunctionToolCallback, HttpTransport, NoopObservationSink, RetryListener,
    RetryPolicy, ToolCallback, ToolDefinition,
};
use secrecy::SecretString;

use self::mock_moonshot::{API_KEY, MockMoonshot};

/// HTTP transport pointed at the mock
pub fn transport(mock: &MockMoonshot, api_key: &str) -> HttpTransport {
    HttpTransport::builder(SecretString::from(api_key.to_owned()))
        .base_url(mock.base_url())
        .build()
        .unwrap()
}

/// Chat model talking to the mock with the given retry policy
pub fn model(mock: &MockMoonshot, retry: RetryPolicy) -> ChatModel {
    ChatModel::builder()
        .transport(Arc::new(transport(mock, API_KEY)))
        .retry_policy(retry)
        .observation_sink(Arc::new(NoopObservationSink))
        .build()
        .unwrap()
}

/// Weather tool answering with a fixed forecast
pub fn weather_tool(return_direct: bool) -> Arc<dyn ToolCallback> {
    Arc::new(
        FunctionToolCallback::new(
            ToolDefinition::new(
                "get_weather",
                "Current weather for a city",
                serde_json::json!({"type": "object", "properties": {"city": {"type": "string"}}}),
            ),
            |arguments, _| {
                let args: serde_json::Value =
                    serde_json::from_str(arguments).map_err(|e| ChatError::ToolExecution(e.to_string()))?;
                Ok(format!("sunny in {}", args["city"].as_str().unwrap_or("nowhere")))
            },
        )
        .with_return_direct(return_direct),
    )
}

/// Options enabling the weather tool
pub fn weather_options(return_direct: bool) -> ChatOptions {
    ChatOptions::default().with_tool_callback(weather_tool(return_direct))
}

/// Retry listener counting failures and reported retries
#[derive(Default)]
pub struct CountingListener {
    pub errors: AtomicU32,
    pub retries: AtomicU32,
}

impl CountingListener {
    pub fn errors(&self) -> u32 {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }
}

impl RetryListener for CountingListener {
    fn on_error(&self, _attempt: u32, _error: &ChatError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, retries: u32) {
        self.retries.store(retries, Ordering::SeqCst);
    }
}
