use std::path::Path;

use secrecy::ExposeSecret;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml_str(&raw)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_client()?;
        self.validate_chat()?;
        self.validate_retry()?;
        Ok(())
    }

    fn validate_client(&self) -> anyhow::Result<()> {
        self.client.base_url()?;
        self.client.timeout()?;

        if self.client.api_key.expose_secret().trim().is_empty() {
            anyhow::bail!("client.api_key must not be empty");
        }

        Ok(())
    }

    fn validate_chat(&self) -> anyhow::Result<()> {
        let options = &self.chat.options;

        if options.model.trim().is_empty() {
            anyhow::bail!("chat.options.model must not be empty");
        }

        if !(0.0..=1.0).contains(&options.temperature) {
            anyhow::bail!("chat.options.temperature must be between 0.0 and 1.0");
        }

        if let Some(top_p) = options.top_p
            && !(0.0..=1.0).contains(&top_p)
        {
            anyhow::bail!("chat.options.top_p must be between 0.0 and 1.0");
        }

        Ok(())
    }

    fn validate_retry(&self) -> anyhow::Result<()> {
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }

        if self.retry.multiplier < 1.0 {
            anyhow::bail!("retry.multiplier must be at least 1.0");
        }

        let initial = self.retry.initial_backoff()?;
        let max = self.retry.max_backoff()?;
        if max < initial {
            anyhow::bail!("retry.max_backoff must not be shorter than retry.initial_backoff");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use indoc::indoc;
    use secrecy::ExposeSecret;

    use crate::telemetry::ExportProtocol;
    use crate::{Config, ToolChoiceConfig};

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_toml_str(indoc! {r#"
            [client]
            api_key = "sk-test"
        "#})
        .unwrap();

        assert_eq!(config.client.base_url().unwrap().as_str(), "https://api.moonshot.cn/");
        assert_eq!(config.client.completions_path, "/v1/chat/completions");
        assert_eq!(config.client.timeout().unwrap(), None);
        assert_eq!(config.chat.options.model, "moonshot-v1-8k");
        assert!((config.chat.options.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.initial_backoff().unwrap(), Duration::from_secs(2));
        assert!((config.retry.multiplier - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.retry.max_backoff().unwrap(), Duration::from_secs(180));
        assert!(config.telemetry.is_none());
    }

    #[test]
    fn full_config_parses() {
        let config = Config::from_toml_str(indoc! {r#"
            [client]
            base_url = "http://127.0.0.1:8080"
            api_key = "sk-test"
            completions_path = "/chat"
            timeout = "30s"

            [chat.options]
            model = "moonshot-v1-32k"
            temperature = 0.3
            top_p = 0.9
            max_tokens = 512
            n = 1
            stop = ["END"]
            user = "cli"
            tool_choice = "auto"
            internal_tool_execution_enabled = false
            tool_names = ["weather"]

            [retry]
            max_attempts = 3
            initial_backoff = "100ms"
            multiplier = 2.0
            max_backoff = "1s"

            [telemetry]
            service_name = "moonshot-cli"

            [telemetry.exporter]
            endpoint = "http://localhost:4318"
            protocol = "http_proto"
        "#})
        .unwrap();

        assert_eq!(config.client.timeout().unwrap(), Some(Duration::from_secs(30)));
        let options = &config.chat.options;
        assert_eq!(options.model, "moonshot-v1-32k");
        assert_eq!(options.max_tokens, Some(512));
        assert_eq!(options.tool_choice, Some(ToolChoiceConfig::Auto));
        assert_eq!(options.internal_tool_execution_enabled, Some(false));
        assert_eq!(options.tool_names, vec!["weather".to_owned()]);
        assert_eq!(config.retry.initial_backoff().unwrap(), Duration::from_millis(100));

        let telemetry = config.telemetry.unwrap();
        assert_eq!(telemetry.service_name, "moonshot-cli");
        assert_eq!(telemetry.exporter.unwrap().protocol, ExportProtocol::HttpProto);
        assert!(telemetry.tracing.parent_based);
    }

    #[test]
    fn api_key_is_expanded_from_environment() {
        temp_env::with_var("MOONSHOT_LOADER_KEY", Some("sk-from-env"), || {
            let config = Config::from_toml_str(indoc! {r#"
                [client]
                api_key = "{{ env.MOONSHOT_LOADER_KEY }}"
            "#})
            .unwrap();

            assert_eq!(config.client.api_key.expose_secret(), "sk-from-env");
        });
    }

    #[test]
    fn missing_client_section_is_rejected() {
        let err = Config::from_toml_str("[retry]\nmax_attempts = 2\n").unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        temp_env::with_var_unset("MOONSHOT_LOADER_KEY", || {
            let err = Config::from_toml_str(indoc! {r#"
                [client]
                api_key = "{{ env.MOONSHOT_LOADER_KEY | default("") }}"
            "#})
            .unwrap_err();

            assert!(err.to_string().contains("api_key"));
        });
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Config::from_toml_str(indoc! {r#"
            [client]
            api_key = "sk-test"
            region = "cn"
        "#})
        .unwrap_err();

        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = Config::from_toml_str(indoc! {r#"
            [client]
            base_url = "not a url"
            api_key = "sk-test"
        "#})
        .unwrap_err();

        assert!(err.to_string().contains("client.base_url"));
    }

    #[test]
    fn out_of_range_sampling_is_rejected() {
        let err = Config::from_toml_str(indoc! {r#"
            [client]
            api_key = "sk-test"

            [chat.options]
            temperature = 1.5
        "#})
        .unwrap_err();
        assert!(err.to_string().contains("temperature"));

        let err = Config::from_toml_str(indoc! {r#"
            [client]
            api_key = "sk-test"

            [chat.options]
            top_p = -0.1
        "#})
        .unwrap_err();
        assert!(err.to_string().contains("top_p"));
    }

    #[test]
    fn retry_bounds_are_enforced() {
        let zero_attempts = indoc! {r#"
            [client]
            api_key = "sk-test"

            [retry]
            max_attempts = 0
        "#};
        assert!(Config::from_toml_str(zero_attempts).unwrap_err().to_string().contains("max_attempts"));

        let shrinking = indoc! {r#"
            [client]
            api_key = "sk-test"

            [retry]
            multiplier = 0.5
        "#};
        assert!(Config::from_toml_str(shrinking).unwrap_err().to_string().contains("multiplier"));

        let bad_duration = indoc! {r#"
            [client]
            api_key = "sk-test"

            [retry]
            initial_backoff = "soon"
        "#};
        assert!(Config::from_toml_str(bad_duration).unwrap_err().to_string().contains("initial_backoff"));
    }

    #[test]
    fn load_reads_from_disk() {
        let path = std::env::temp_dir().join(format!("moonshot-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[client]\napi_key = \"sk-disk\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.client.api_key.expose_secret(), "sk-disk");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(std::path::Path::new("/nonexistent/moonshot.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
