use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{parse_provider_model, LlmConfig};
use crate::error::{CoreError, Result};
use crate::llm::api::LlmApiClient;
use crate::resilience::{with_resilience, CircuitBreaker, CircuitBreakerConfig, RetryConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAI,
    OpenRouter,
    Ollama,
    LmStudio,
    OpenAICompatible { base_url: String },
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
}

/// Structured-completion client backing the Extractor (§4.6). The only
/// consumer of LLM completions in this crate is extraction, so this provider
/// carries the Extractor's retry/breaker defaults (§4.8: `{failures=5,
/// timeout=30s}`) rather than taking them as a parameter at every call site.
#[derive(Clone)]
pub struct LlmProvider {
    backend: LlmBackend,
    config: Option<Arc<LlmConfig>>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
}

impl LlmProvider {
    pub fn new(config: Option<&LlmConfig>) -> Self {
        let Some(config) = config else {
            return Self::unavailable("no LLM configuration provided");
        };

        let (provider, _model) = parse_provider_model(&config.model);

        let backend = match provider.to_lowercase().as_str() {
            "openai" => LlmBackend::OpenAI,
            "openrouter" => LlmBackend::OpenRouter,
            "ollama" => LlmBackend::Ollama,
            "lmstudio" => LlmBackend::LmStudio,
            _ => {
                if let Some(base_url) = &config.base_url {
                    LlmBackend::OpenAICompatible { base_url: base_url.clone() }
                } else {
                    LlmBackend::Unavailable { reason: format!("unknown provider in model: {}", config.model) }
                }
            }
        };

        Self {
            backend,
            config: Some(Arc::new(config.clone())),
            breaker: Arc::new(CircuitBreaker::new(CircuitBreakerConfig::extractor())),
            retry: RetryConfig { max_attempts: config.max_retries.max(1), ..RetryConfig::default() },
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            backend: LlmBackend::Unavailable { reason: reason.to_string() },
            config: None,
            breaker: Arc::new(CircuitBreaker::new(CircuitBreakerConfig::extractor())),
            retry: RetryConfig::default(),
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, LlmBackend::Unavailable { .. })
    }

    pub fn backend(&self) -> &LlmBackend {
        &self.backend
    }

    pub fn config(&self) -> Option<&LlmConfig> {
        self.config.as_deref()
    }

    pub async fn complete(&self, prompt: &str, options: Option<&CompletionOptions>) -> Result<String> {
        let config = self.require_config()?;
        let prompt = prompt.to_string();
        let options = options.cloned();
        with_resilience(&self.breaker, &self.retry, || {
            let prompt = prompt.clone();
            let options = options.clone();
            async move {
                let client = LlmApiClient::new(config)?;
                client.complete(&prompt, None, options.as_ref()).await
            }
        })
        .await
    }

    pub async fn complete_json(&self, prompt: &str, options: Option<&CompletionOptions>) -> Result<Value> {
        let config = self.require_config()?;
        let prompt = prompt.to_string();
        let options = options.cloned();
        with_resilience(&self.breaker, &self.retry, || {
            let prompt = prompt.clone();
            let options = options.clone();
            async move {
                let client = LlmApiClient::new(config)?;
                client.complete_json(&prompt, options.as_ref()).await
            }
        })
        .await
    }

    pub async fn complete_structured<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        let json_value = self.complete_json(prompt, None).await?;
        serde_json::from_value(json_value).map_err(|e| CoreError::Internal(format!("failed to deserialize LLM response: {e}")))
    }

    fn require_config(&self) -> Result<&LlmConfig> {
        if !self.is_available() {
            return Err(CoreError::UpstreamUnavailable(self.unavailable_reason()));
        }
        self.config().ok_or_else(|| CoreError::UpstreamUnavailable(self.unavailable_reason()))
    }

    fn unavailable_reason(&self) -> String {
        match &self.backend {
            LlmBackend::Unavailable { reason } => reason.clone(),
            _ => "LLM completion is not available".to_string(),
        }
    }
}

impl std::fmt::Debug for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmProvider").field("backend", &self.backend).field("breaker_state", &self.breaker.state()).finish()
    }
}
