//! Translates configuration into chat client components

use std::sync::Arc;

use moonshot_chat::{ChatModel, ChatOptions, HttpTransport, RetryPolicy, ToolChoice};
use moonshot_config::{ChatOptionsConfig, ClientConfig, Config, RetryConfig, ToolChoiceConfig};

/// Build a chat model from loaded configuration
pub fn chat_model(config: Config) -> anyhow::Result<ChatModel> {
    let options = chat_options(&config.chat.options);
    let retry = retry_policy(&config.retry)?;
    let transport = transport(config.client)?;

    Ok(ChatModel::builder()
        .transport(Arc::new(transport))
        .default_options(options)
        .retry_policy(retry)
        .build()?)
}

/// Default request options from the `[chat.options]` section
pub fn chat_options(config: &ChatOptionsConfig) -> ChatOptions {
    let mut options = ChatOptions::default()
        .with_model(config.model.clone())
        .with_temperature(config.temperature);

    options.top_p = config.top_p;
    options.max_tokens = config.max_tokens;
    options.n = config.n;
    options.presence_penalty = config.presence_penalty;
    options.frequency_penalty = config.frequency_penalty;
    options.stop.clone_from(&config.stop);
    options.user.clone_from(&config.user);
    options.tool_choice = config.tool_choice.map(|choice| match choice {
        ToolChoiceConfig::None => ToolChoice::None,
        ToolChoiceConfig::Auto => ToolChoice::Auto,
        ToolChoiceConfig::Required => ToolChoice::Required,
    });
    options.internal_tool_execution_enabled = config.internal_tool_execution_enabled;

    config
        .tool_names
        .iter()
        .fold(options, |options, name| options.with_tool_name(name.clone()))
}

/// Retry policy from the `[retry]` section
pub fn retry_policy(config: &RetryConfig) -> anyhow::Result<RetryPolicy> {
    Ok(RetryPolicy::new(
        config.max_attempts,
        config.initial_backoff()?,
        config.multiplier,
        config.max_backoff()?,
    ))
}

/// HTTP transport from the `[client]` section
pub fn transport(config: ClientConfig) -> anyhow::Result<HttpTransport> {
    let base_url = config.base_url()?;
    let timeout = config.timeout()?;

    let mut builder = HttpTransport::builder(config.api_key)
        .base_url(base_url)
        .completions_path(config.completions_path);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use indoc::indoc;

    use super::*;

    fn config(toml: &str) -> Config {
        Config::from_toml_str(toml).unwrap()
    }

    #[test]
    fn options_section_maps_onto_request_defaults() {
        let config = config(indoc! {r#"
            [client]
            api_key = "sk-test"

            [chat.options]
            model = "moonshot-v1-32k"
            temperature = 0.2
            max_tokens = 256
            stop = ["END"]
            tool_choice = "required"
            internal_tool_execution_enabled = false
            tool_names = ["weather", "clock"]
        "#});

        let options = chat_options(&config.chat.options);

        assert_eq!(options.model.as_deref(), Some("moonshot-v1-32k"));
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.max_tokens, Some(256));
        assert_eq!(options.stop, Some(vec!["END".to_owned()]));
        assert_eq!(options.tool_choice, Some(ToolChoice::Required));
        assert!(!options.is_internal_tool_execution_enabled());
        let names: Vec<_> = options.tool_names.unwrap().into_iter().collect();
        assert_eq!(names, vec!["clock".to_owned(), "weather".to_owned()]);
    }

    #[test]
    fn unset_options_stay_unset() {
        let config = config("[client]\napi_key = \"sk-test\"\n");

        let options = chat_options(&config.chat.options);

        assert_eq!(options.model.as_deref(), Some("moonshot-v1-8k"));
        assert_eq!(options.temperature, Some(0.7));
        assert!(options.top_p.is_none());
        assert!(options.tool_choice.is_none());
        assert!(options.tool_names.is_none());
        assert!(options.is_internal_tool_execution_enabled());
    }

    #[test]
    fn retry_section_maps_onto_policy() {
        let config = config(indoc! {r#"
            [client]
            api_key = "sk-test"

            [retry]
            max_attempts = 4
            initial_backoff = "100ms"
            multiplier = 3.0
            max_backoff = "500ms"
        "#});

        let policy = retry_policy(&config.retry).unwrap();

        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(300));
        assert_eq!(policy.backoff(3), Duration::from_millis(500));
    }

    #[test]
    fn client_section_maps_onto_transport_url() {
        let config = config(indoc! {r#"
            [client]
            base_url = "http://127.0.0.1:9000/api"
            api_key = "sk-test"
            completions_path = "/v1/chat/completions"
            timeout = "5s"
        "#});

        let transport = transport(config.client).unwrap();

        assert_eq!(
            transport.completions_url().as_str(),
            "http://127.0.0.1:9000/api/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn full_config_builds_a_model() {
        let config = config("[client]\napi_key = \"sk-test\"\n");

        let model = chat_model(config).unwrap();

        assert_eq!(model.default_options().model.as_deref(), Some("moonshot-v1-8k"));
    }
}
