//! Moonshot HTTP transport

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{StreamExt, future};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{ChatTransport, ChunkStream};
use crate::error::ChatError;
use crate::protocol::{ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, ErrorResponse};

/// Default Moonshot API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.moonshot.cn";

/// Default chat completions path
pub const DEFAULT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Sends chat completion requests over HTTP with bearer authentication
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    completions_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("completions_url", &self.completions_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Start building a transport for the given API key
    pub fn builder(api_key: SecretString) -> HttpTransportBuilder {
        HttpTransportBuilder {
            api_key,
            base_url: None,
            completions_path: DEFAULT_COMPLETIONS_PATH.to_owned(),
            timeout: None,
        }
    }

    /// Full URL requests are posted to
    pub const fn completions_url(&self) -> &Url {
        &self.completions_url
    }

    async fn send(&self, request: &ChatCompletionRequest) -> Result<reqwest::Response, ChatError> {
        let response = self
            .client
            .post(self.completions_url.clone())
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat completion request failed");
                classify_reqwest_error(&e)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, model = %request.model, "chat completion returned error");
        Err(classify_status(status, &body))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion, ChatError> {
        let response = self.send(request).await?;

        response
            .json::<ChatCompletion>()
            .await
            .map_err(|e| ChatError::fatal(format!("failed to parse response: {e}")))
    }

    async fn chat_completion_stream(&self, request: &ChatCompletionRequest) -> Result<ChunkStream, ChatError> {
        let response = self.send(request).await?;

        let chunks = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| {
                let done = matches!(event, Ok(event) if event.data.trim() == "[DONE]");
                future::ready(!done)
            })
            .filter_map(|event| {
                let item = match event {
                    Ok(event) => match serde_json::from_str::<ChatCompletionChunk>(event.data.trim()) {
                        Ok(chunk) => Some(Ok(chunk)),
                        Err(e) => {
                            tracing::debug!(error = %e, data = %event.data, "skipping unparseable SSE chunk");
                            None
                        }
                    },
                    Err(e) => Some(Err(ChatError::Streaming(e.to_string()))),
                };
                future::ready(item)
            });

        Ok(Box::pin(chunks))
    }
}

/// Builder for [`HttpTransport`]
#[derive(Debug)]
pub struct HttpTransportBuilder {
    api_key: SecretString,
    base_url: Option<Url>,
    completions_path: String,
    timeout: Option<Duration>,
}

impl HttpTransportBuilder {
    /// Override the base URL (defaults to [`DEFAULT_BASE_URL`])
    #[must_use]
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Override the completions path (defaults to [`DEFAULT_COMPLETIONS_PATH`])
    #[must_use]
    pub fn completions_path(mut self, path: impl Into<String>) -> Self {
        self.completions_path = path.into();
        self
    }

    /// Per-request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the transport
    ///
    /// Fails with a validation error when the API key is empty or the URL
    /// cannot be formed.
    pub fn build(self) -> Result<HttpTransport, ChatError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(ChatError::Validation("API key must be set".to_owned()));
        }

        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL)
                .map_err(|e| ChatError::Validation(format!("invalid default base URL: {e}")))?,
        };
        let completions_url = join_path(&base_url, &self.completions_path)?;

        let mut client = Client::builder();
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }
        let client = client
            .build()
            .map_err(|e| ChatError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

        Ok(HttpTransport {
            client,
            completions_url,
            api_key: self.api_key,
        })
    }
}

fn join_path(base_url: &Url, path: &str) -> Result<Url, ChatError> {
    let base = base_url.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Url::parse(&format!("{base}/{path}"))
        .map_err(|e| ChatError::Validation(format!("invalid completions URL '{base}/{path}': {e}")))
}

fn classify_reqwest_error(error: &reqwest::Error) -> ChatError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        ChatError::TransientTransport(error.to_string())
    } else {
        ChatError::fatal(error.to_string())
    }
}

/// Map an error status to a transient or fatal transport error
fn classify_status(status: StatusCode, body: &str) -> ChatError {
    let detail = serde_json::from_str::<ErrorResponse>(body).map_or_else(|_| body.to_owned(), |e| e.error.message);
    let message = format!("provider returned {status}: {detail}");

    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ChatError::TransientTransport(message)
    } else {
        ChatError::FatalTransport {
            status: Some(status.as_u16()),
            message,
        }
    }
}
