use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Provider-specific default base URLs.
pub fn default_base_url(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        "lmstudio" => "http://localhost:1234/v1",
        _ => "https://api.openai.com/v1",
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    /// Unused by this client (retries happen in `resilience::retry`); kept so
    /// callers can still describe a provider's configured retry budget.
    pub max_retries: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Single-attempt OpenAI-compatible embeddings client. Retrying a failed call
/// is the caller's job (`EmbeddingProvider::embed` wraps this in the
/// Embedder's retry/breaker façade); this type only classifies each HTTP
/// outcome into the right `CoreError` kind so the façade can tell transient
/// failures from terminal ones.
#[derive(Clone)]
pub struct EmbeddingApiClient {
    client: Client,
    config: ApiConfig,
}

impl EmbeddingApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts.to_vec(),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref api_key) = self.config.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| CoreError::Internal(format!("invalid API key header: {e}")))?,
            );
        }

        let url = format!("{}/embeddings", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::Transient(format!("embedding request failed: {e}")))?;

        let status = response.status();

        if status.is_success() {
            let body: EmbeddingResponse = response
                .json()
                .await
                .map_err(|e| CoreError::Internal(format!("failed to parse embedding response: {e}")))?;
            return Ok(body.data.into_iter().map(|d| d.embedding).collect());
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Transient(format!("embedding provider error {status}: {body}")));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Forbidden(format!("embedding provider auth rejected: {body}")));
        }

        let body = response.text().await.unwrap_or_default();
        Err(CoreError::UpstreamUnavailable(format!("embedding provider returned {status}: {body}")))
    }

    pub async fn detect_dimensions(&self) -> Result<usize> {
        let embeddings = self.embed(&["test"]).await?;
        embeddings.first().map(|e| e.len()).ok_or_else(|| CoreError::Internal("no embedding returned".to_string()))
    }
}
