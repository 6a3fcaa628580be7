#![allow(clippy::must_use_candidate)]

pub mod chat;
pub mod client;
mod env;
mod loader;
pub mod retry;
pub mod telemetry;

use serde::Deserialize;

pub use chat::*;
pub use client::*;
pub use env::EnvError;
pub use retry::*;
pub use telemetry::TelemetryConfig;

/// Top-level Moonshot client configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Connection to the chat completion endpoint
    pub client: ClientConfig,
    /// Process-wide chat defaults
    #[serde(default)]
    pub chat: ChatConfig,
    /// Retry behaviour for transient transport failures
    #[serde(default)]
    pub retry: RetryConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
