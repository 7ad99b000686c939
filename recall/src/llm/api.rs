use std::time::Duration;

use serde_json::Value;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
        Stop,
    },
    Client,
};

use crate::{
    config::{parse_provider_model, LlmConfig},
    error::{CoreError, Result},
    llm::provider::CompletionOptions,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Debug, Clone)]
struct ApiConfig {
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_secs: u64,
}

/// Single-attempt OpenAI-compatible chat client. This type only issues one
/// call and classifies the outcome; retrying belongs to the Extractor's
/// retry/breaker façade in `llm/provider.rs` (§4.8), not here.
#[derive(Clone)]
pub struct LlmApiClient {
    client: Client<OpenAIConfig>,
    config: ApiConfig,
}

impl LlmApiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_config = ApiConfig::from_llm_config(config);

        let (provider, _) = parse_provider_model(&config.model);
        let needs_api_key = !matches!(provider.to_lowercase().as_str(), "ollama" | "local" | "lmstudio");

        if needs_api_key && api_config.api_key.is_none() {
            return Err(CoreError::Invalid("API key required for this LLM provider".to_string()));
        }

        let openai_config = OpenAIConfig::new()
            .with_api_base(api_config.base_url.clone())
            .with_api_key(api_config.api_key.clone().unwrap_or_default());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api_config.timeout_secs))
            .build()
            .map_err(|error| CoreError::Internal(format!("failed to create LLM HTTP client: {error}")))?;

        // Bound async-openai's own internal retry/backoff to our call timeout so
        // it never outlives the Extractor breaker's notion of "one attempt".
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(api_config.timeout_secs)),
            ..Default::default()
        };

        let client = Client::with_config(openai_config).with_http_client(http_client).with_backoff(backoff);

        Ok(Self { client, config: api_config })
    }

    pub async fn complete(&self, prompt: &str, system_prompt: Option<&str>, options: Option<&CompletionOptions>) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(CoreError::Invalid("prompt cannot be empty".to_string()));
        }

        let request = self.build_request(prompt, system_prompt, options)?;
        match self.client.chat().create(request).await {
            Ok(response) => Self::extract_content(response),
            Err(error) => Err(Self::map_openai_error(error)),
        }
    }

    pub async fn complete_json(&self, prompt: &str, options: Option<&CompletionOptions>) -> Result<Value> {
        if prompt.trim().is_empty() {
            return Err(CoreError::Invalid("prompt cannot be empty".to_string()));
        }

        let request = self.build_json_request(prompt, options)?;
        match self.client.chat().create(request).await {
            Ok(response) => {
                let content = Self::extract_content(response)?;
                tracing::debug!(response_len = content.len(), "LLM JSON response received");
                serde_json::from_str(&content).map_err(|e| {
                    tracing::error!(response_len = content.len(), response_preview = %&content.chars().take(100).collect::<String>(), error = %e, "failed to parse JSON response");
                    CoreError::Internal(format!("failed to parse JSON response: {e}"))
                })
            }
            Err(error) => Err(Self::map_openai_error(error)),
        }
    }

    fn build_request(&self, prompt: &str, system_prompt: Option<&str>, options: Option<&CompletionOptions>) -> Result<CreateChatCompletionRequest> {
        let mut messages = Vec::new();

        if let Some(system_prompt) = system_prompt.filter(|value| !value.trim().is_empty()) {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|error| CoreError::Invalid(format!("invalid system prompt: {error}")))?
                    .into(),
            );
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|error| CoreError::Invalid(format!("invalid user prompt: {error}")))?
                .into(),
        );

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(self.config.model.clone()).messages(messages);
        Self::apply_completion_options(&mut request, options);

        request.build().map_err(|error| CoreError::Invalid(format!("invalid LLM completion request: {error}")))
    }

    fn build_json_request(&self, prompt: &str, options: Option<&CompletionOptions>) -> Result<CreateChatCompletionRequest> {
        let messages = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|error| CoreError::Invalid(format!("invalid user prompt: {error}")))?
            .into()];

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(self.config.model.clone()).messages(messages);
        Self::apply_completion_options(&mut request, options);

        request.build().map_err(|error| CoreError::Invalid(format!("invalid LLM JSON request: {error}")))
    }

    fn apply_completion_options(request: &mut CreateChatCompletionRequestArgs, options: Option<&CompletionOptions>) {
        let Some(options) = options else {
            return;
        };

        if let Some(temperature) = options.temperature {
            request.temperature(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            request.max_tokens(max_tokens);
        }
        if let Some(top_p) = options.top_p {
            request.top_p(top_p);
        }
        if let Some(stop) = options.stop.as_ref().filter(|values| !values.is_empty()) {
            request.stop(Stop::StringArray(stop.clone()));
        }
    }

    fn extract_content(response: CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::UpstreamUnavailable("LLM response contained no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if message.trim().is_empty() {
            return Err(CoreError::UpstreamUnavailable("LLM response contained empty content".to_string()));
        }

        Ok(message)
    }

    /// Classifies an `async-openai` error into the core taxonomy. Rate
    /// limits, 5xx responses, and bare connection failures are `Transient`
    /// (retryable by the Extractor façade); auth failures are terminal.
    fn map_openai_error(error: OpenAIError) -> CoreError {
        match &error {
            OpenAIError::Reqwest(reqwest_error) => match reqwest_error.status() {
                Some(reqwest::StatusCode::UNAUTHORIZED) | Some(reqwest::StatusCode::FORBIDDEN) => {
                    CoreError::Forbidden(format!("LLM authentication failed: {reqwest_error}"))
                }
                Some(reqwest::StatusCode::TOO_MANY_REQUESTS) => CoreError::Transient(format!("LLM rate limited: {reqwest_error}")),
                Some(status) if status.is_server_error() => CoreError::Transient(format!("LLM server error {status}: {reqwest_error}")),
                _ => CoreError::Transient(format!("LLM request failed: {reqwest_error}")),
            },
            OpenAIError::ApiError(api_error) if Self::is_rate_limit_api_error(api_error) => {
                CoreError::Transient(format!("LLM rate limited: {api_error}"))
            }
            OpenAIError::ApiError(api_error) if Self::is_auth_api_error(api_error) => {
                CoreError::Forbidden(format!("LLM authentication failed: {api_error}"))
            }
            OpenAIError::ApiError(api_error) => CoreError::UpstreamUnavailable(format!("LLM API error: {api_error}")),
            OpenAIError::JSONDeserialize(err) => CoreError::Internal(format!("failed to parse LLM response: {err}")),
            OpenAIError::InvalidArgument(message) => CoreError::Invalid(message.clone()),
            other => CoreError::UpstreamUnavailable(other.to_string()),
        }
    }

    fn is_rate_limit_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("rate limit")
            || message.contains("too many requests")
            || error_type.contains("rate_limit")
            || code.contains("rate_limit")
            || code == "insufficient_quota"
    }

    fn is_auth_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("unauthorized")
            || message.contains("forbidden")
            || message.contains("authentication")
            || message.contains("invalid api key")
            || code.contains("invalid_api_key")
            || code.contains("authentication")
            || error_type.contains("authentication")
    }
}

impl ApiConfig {
    fn from_llm_config(config: &LlmConfig) -> Self {
        let (provider, model) = parse_provider_model(&config.model);

        let base_url = config.base_url.clone().unwrap_or_else(|| default_base_url(provider).to_string());

        let normalized_model = if provider.eq_ignore_ascii_case("local") { config.model.clone() } else { model.to_string() };

        Self {
            base_url,
            api_key: config.api_key.clone(),
            model: normalized_model,
            timeout_secs: config.timeout_secs,
        }
    }
}

fn default_base_url(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "openai" => OPENAI_BASE_URL,
        "openrouter" => OPENROUTER_BASE_URL,
        "ollama" => OLLAMA_BASE_URL,
        "lmstudio" => "http://localhost:1234/v1",
        _ => OPENAI_BASE_URL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_llm_config() -> LlmConfig {
        LlmConfig {
            model: "ollama/llama3".to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: 30,
            max_retries: 0,
        }
    }

    #[test]
    fn test_llm_array_response_parsing() {
        let array_response = r#"[
            {"content": "User prefers dark mode", "memory_type": "preference", "confidence": 0.9},
            {"content": "User is a software engineer", "memory_type": "fact", "confidence": 0.85}
        ]"#;

        let parsed: serde_json::Result<Value> = serde_json::from_str(array_response);
        assert!(parsed.is_ok(), "array JSON should parse successfully");

        let value = parsed.unwrap();
        assert!(value.is_array());
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_build_json_request_does_not_force_json_object_format() {
        let config = test_llm_config();
        let client = LlmApiClient::new(&config).expect("client should be created");

        let request = client.build_json_request("test prompt", None).expect("request should build");

        assert!(
            request.response_format.is_none(),
            "build_json_request should NOT set response_format so array responses work"
        );
    }

    #[test]
    fn test_llm_empty_array_response_parsing() {
        let empty_array = "[]";
        let parsed: serde_json::Result<Value> = serde_json::from_str(empty_array);
        assert!(parsed.is_ok());
        assert!(parsed.unwrap().is_array());
    }
}
