//! Text-generation providers over the OpenAI-style chat-completions contract

use std::time::Duration;

use serde_json::{Value, json};

use apiforge_core::LlmConfig;

use super::GenerationError;

/// Completions can take a while on large prompts.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Something that turns a prompt into text.
pub trait TextGenerator {
    /// # Errors
    ///
    /// Returns error when the provider is unreachable or answers without text.
    fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError>;
}

/// Base URL used when the profile does not set `endpoint`.
#[must_use]
pub fn default_endpoint(provider: &str) -> String {
    match provider {
        "local" => "http://localhost:11434/v1".to_string(),
        "openrouter" => "https://openrouter.ai/api/v1".to_string(),
        "openai" => "https://api.openai.com/v1".to_string(),
        "xai" => "https://api.x.ai/v1".to_string(),
        "anthropic" => "https://api.anthropic.com/v1".to_string(),
        other => format!("https://api.{other}.com/v1"),
    }
}

/// Blocking client for `POST {endpoint}/chat/completions`.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::blocking::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
}

impl ChatCompletionsClient {
    /// # Errors
    ///
    /// Returns error if a remote provider has no API key or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        let api_key = config.resolved_api_key();
        if config.provider != "local" && api_key.is_none() {
            return Err(GenerationError::Config(format!(
                "provider `{}` requires an API key (set llm.api_key or APIFORGE_LLM_API_KEY)",
                config.provider
            )));
        }
        let base = config
            .endpoint
            .clone()
            .unwrap_or_else(|| default_endpoint(&config.provider));
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GenerationError::Provider(e.to_string()))?;
        Ok(Self {
            http,
            url: format!("{}/chat/completions", base.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TextGenerator for ChatCompletionsClient {
    fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt}
            ]
        });

        let mut req = self.http.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        tracing::info!(
            url = %self.url,
            model = %self.model,
            prompt_chars = prompt.len(),
            "requesting completion"
        );
        let resp = req
            .send()
            .map_err(|e| GenerationError::Provider(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| GenerationError::Provider(e.to_string()))?;
        if !status.is_success() {
            return Err(GenerationError::Provider(format!(
                "API error {}: {}",
                status.as_u16(),
                text.chars().take(500).collect::<String>()
            )));
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| GenerationError::Provider(format!("failed to parse response: {e}")))?;
        let content = json["choices"]
            .as_array()
            .and_then(|choices| choices.first())
            .and_then(|first| first["message"]["content"].as_str())
            .ok_or_else(|| GenerationError::Provider("no text content in response".into()))?;
        tracing::debug!(response_chars = content.len(), "completion received");
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_per_provider() {
        assert_eq!(default_endpoint("local"), "http://localhost:11434/v1");
        assert_eq!(default_endpoint("openrouter"), "https://openrouter.ai/api/v1");
        assert_eq!(default_endpoint("xai"), "https://api.x.ai/v1");
        assert_eq!(default_endpoint("mistral"), "https://api.mistral.com/v1");
    }

    #[test]
    fn remote_provider_without_key_is_rejected() {
        let config = LlmConfig {
            provider: "openai".into(),
            model: "gpt-4".into(),
            endpoint: None,
            api_key: None,
            max_tokens: 1024,
        };
        // Only meaningful when the environment does not supply a key.
        if config.resolved_api_key().is_none() {
            assert!(matches!(
                ChatCompletionsClient::from_config(&config),
                Err(GenerationError::Config(_))
            ));
        }
    }

    #[test]
    fn local_provider_needs_no_key_and_joins_url() {
        let config = LlmConfig {
            provider: "local".into(),
            model: "llama3".into(),
            endpoint: Some("http://127.0.0.1:9999/v1/".into()),
            api_key: None,
            max_tokens: 1024,
        };
        let client = ChatCompletionsClient::from_config(&config).unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:9999/v1/chat/completions");
    }
}
