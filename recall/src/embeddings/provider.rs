use std::sync::Arc;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;

use crate::config::{parse_provider_model, EmbeddingsConfig};
use crate::error::{CoreError, Result};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, RetryConfig};

use super::api::{ApiConfig, EmbeddingApiClient};

enum EmbeddingBackend {
    Local {
        model: Arc<Mutex<TextEmbedding>>,
        batch_size: usize,
    },
    Api(EmbeddingApiClient),
}

/// Wraps a local (fastembed) or remote (OpenAI-compatible) embedding backend
/// behind the Embedder's circuit breaker (§4.8: `{failures=3, timeout=60s}`
/// by default, overridable via `EmbeddingsConfig`). A tripped breaker or an
/// exhausted retry surfaces as `CoreError::UpstreamUnavailable`; callers that
/// create memories treat that as "embed later" rather than a hard failure
/// (§4.8's fallback policy: embedding=NULL, semantic search excludes it).
#[derive(Clone)]
pub struct EmbeddingProvider {
    backend: Arc<EmbeddingBackend>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
    dimensions: usize,
    model: String,
}

impl EmbeddingProvider {
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let (provider, model_name) = parse_provider_model(&config.model);

        let backend = if provider == "local" {
            Self::build_local(config, model_name)?
        } else {
            EmbeddingBackend::Api(EmbeddingApiClient::new(ApiConfig {
                base_url: crate::embeddings::api::default_base_url(provider).to_string(),
                api_key: std::env::var("EMBEDDING_API_KEY").ok(),
                model: model_name.to_string(),
                timeout_secs: config.call_timeout_secs,
                max_retries: 0, // retries happen in this layer, not the HTTP client
            })?)
        };

        let breaker_config = CircuitBreakerConfig {
            name: "embedder".into(),
            failure_threshold: u64::from(config.failure_threshold),
            success_threshold: 2,
            timeout: std::time::Duration::from_secs(config.breaker_timeout_secs),
            half_open_max_calls: 1,
        };

        Ok(Self {
            backend: Arc::new(backend),
            breaker: Arc::new(CircuitBreaker::new(breaker_config)),
            retry: RetryConfig::default(),
            dimensions: config.dimensions,
            model: config.model.clone(),
        })
    }

    fn build_local(config: &EmbeddingsConfig, model_name: &str) -> Result<EmbeddingBackend> {
        let embedding_model = match model_name {
            "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            "BAAI/bge-large-en-v1.5" | "bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
            "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            "all-MiniLM-L12-v2" | "sentence-transformers/all-MiniLM-L12-v2" => EmbeddingModel::AllMiniLML12V2,
            "nomic-embed-text-v1" | "nomic-ai/nomic-embed-text-v1" => EmbeddingModel::NomicEmbedTextV1,
            "nomic-embed-text-v1.5" | "nomic-ai/nomic-embed-text-v1.5" => EmbeddingModel::NomicEmbedTextV15,
            _ => EmbeddingModel::BGESmallENV15,
        };

        let model = TextEmbedding::try_new(InitOptions::new(embedding_model).with_show_download_progress(true))
            .map_err(|e| CoreError::Internal(format!("failed to load embedding model: {e}")))?;

        Ok(EmbeddingBackend::Local {
            model: Arc::new(Mutex::new(model)),
            batch_size: config.batch_size,
        })
    }

    async fn embed_raw(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        match self.backend.as_ref() {
            EmbeddingBackend::Local { model, batch_size } => {
                let mut model = model.lock().await;
                let batch_size = *batch_size;
                model.embed(texts, Some(batch_size)).map_err(|e| CoreError::Internal(e.to_string()))
            }
            EmbeddingBackend::Api(client) => {
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                client.embed(&refs).await
            }
        }
    }

    /// Embeds a batch of texts behind the Embedder's retry/breaker façade.
    /// Every outbound call funnels through here; no call site rolls its own
    /// retry loop (§4.8).
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        crate::resilience::with_resilience(&self.breaker, &self.retry, || self.embed_raw(texts.clone())).await
    }

    pub async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed(vec![text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| CoreError::Internal("no embedding returned".to_string()))
    }

    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed_single(&format!("query: {query}")).await
    }

    pub async fn embed_passage(&self, passage: &str) -> Result<Vec<f32>> {
        self.embed_single(&format!("passage: {passage}")).await
    }

    pub async fn embed_passages(&self, passages: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let prefixed: Vec<String> = passages.into_iter().map(|p| format!("passage: {p}")).collect();
        self.embed(prefixed).await
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}
