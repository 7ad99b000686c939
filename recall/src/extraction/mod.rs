//! Entity/relation extraction (§4.6) — the delegate the Graph consults to
//! turn a text blob into candidate entities and relations. Output here is
//! intentionally raw: entity/relation type are whatever the LLM said,
//! confidence is unclamped. Normalization (case-folding, coercing unknown
//! types to `other`, snake-casing relation types, clamping confidence,
//! dropping empty names) is the Graph's responsibility, not this module's.

use serde::Deserialize;

use crate::error::Result;
use crate::llm::{prompts, LlmProvider};
use crate::models::Metadata;

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub attributes: Metadata,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedRelation {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub relation_type: String,
    #[serde(default)]
    pub attributes: Metadata,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default)]
    pub relations: Vec<ExtractedRelation>,
}

/// LLM-backed entity/relation extractor. Degrades to an empty result rather
/// than erroring when the LLM is unavailable or returns non-conforming
/// JSON — extraction is best-effort and never blocks memory creation.
#[derive(Clone)]
pub struct Extractor {
    llm: LlmProvider,
}

impl Extractor {
    pub fn new(llm: LlmProvider) -> Self {
        Self { llm }
    }

    pub fn is_available(&self) -> bool {
        self.llm.is_available()
    }

    pub async fn extract(&self, content: &str) -> Result<ExtractionResult> {
        if content.trim().is_empty() {
            return Ok(ExtractionResult::default());
        }

        if !self.llm.is_available() {
            tracing::warn!("LLM unavailable, skipping entity extraction");
            return Ok(ExtractionResult::default());
        }

        let prompt = prompts::entity_relation_extraction_prompt(content);
        match self.llm.complete_structured::<ExtractionResult>(&prompt).await {
            Ok(result) => Ok(result),
            Err(error) => {
                tracing::debug!(error = %error, "entity extraction unavailable, returning empty result");
                Ok(ExtractionResult::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::LlmConfig;

    fn test_llm_unavailable() -> LlmProvider {
        LlmProvider::unavailable("test unavailable")
    }

    fn test_llm_provider(base_url: String) -> LlmProvider {
        let config = LlmConfig {
            model: "openai/gpt-4o-mini".to_string(),
            api_key: Some("test-key".to_string()),
            base_url: Some(base_url),
            timeout_secs: 5,
            max_retries: 0,
        };

        LlmProvider::new(Some(&config))
    }

    fn llm_response(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o-mini",
            "choices": [
                {
                    "index": 0,
                    "message": { "role": "assistant", "content": content },
                    "finish_reason": "stop"
                }
            ],
            "usage": { "prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30 }
        })
    }

    #[tokio::test]
    async fn extract_returns_empty_result_when_llm_unavailable() {
        let extractor = Extractor::new(test_llm_unavailable());

        let result = extractor
            .extract("Ada Lovelace designed the Analytical Engine")
            .await
            .expect("extract should not fail");

        assert!(result.entities.is_empty());
        assert!(result.relations.is_empty());
    }

    #[tokio::test]
    async fn extract_returns_empty_result_for_blank_content() {
        let extractor = Extractor::new(test_llm_unavailable());
        let result = extractor.extract("   ").await.expect("extract should not fail");
        assert!(result.entities.is_empty());
    }

    #[tokio::test]
    async fn extract_parses_entities_and_relations_without_normalizing() {
        let llm_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(llm_response(
                r#"{"entities":[{"name":"Ada Lovelace","type":"Person","aliases":[],"attributes":{},"confidence":0.95}],"relations":[{"from":"Ada Lovelace","to":"Analytical Engine","type":"Designed By","attributes":{},"confidence":1.4}]}"#,
            )))
            .mount(&llm_server)
            .await;

        let extractor = Extractor::new(test_llm_provider(llm_server.uri()));

        let result = extractor
            .extract("Ada Lovelace designed the Analytical Engine")
            .await
            .expect("extract should not fail");

        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].name, "Ada Lovelace");
        assert_eq!(result.entities[0].entity_type, "Person"); // not case-folded here; Graph's job
        assert_eq!(result.relations.len(), 1);
        assert_eq!(result.relations[0].relation_type, "Designed By"); // not snake_cased here
        assert_eq!(result.relations[0].confidence, 1.4); // unclamped; Graph clamps on ingest
    }

    #[tokio::test]
    async fn extract_returns_empty_result_for_malformed_llm_json() {
        let llm_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(llm_response(r#"{"unexpected":"shape"}"#)))
            .mount(&llm_server)
            .await;

        let extractor = Extractor::new(test_llm_provider(llm_server.uri()));

        let result = extractor.extract("some content").await.expect("extract should not fail");
        assert!(result.entities.is_empty());
        assert!(result.relations.is_empty());
    }
}
