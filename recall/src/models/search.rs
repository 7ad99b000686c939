use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Metadata, SearchMode, Visibility};

pub const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.5;
pub const CONTENT_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchFilters {
    #[serde(default)]
    pub tags: Vec<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub visibility: Vec<Visibility>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

impl SearchRequest {
    /// Clamps `limit`/`offset` to the planner's valid ranges (§4.5:
    /// `limit ∈ [1,100]`, `offset ≥ 0`).
    pub fn normalize(mut self) -> Self {
        self.limit = self.limit.clamp(1, 100);
        self
    }
}

/// How a single result row was scored, carried through to the response so
/// the caller can tell which ranking signal produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    Score(f32),
    Similarity(f32),
    CombinedScore(f32),
}

impl Score {
    pub fn value(&self) -> f32 {
        match self {
            Self::Score(v) | Self::Similarity(v) | Self::CombinedScore(v) => *v,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub id: String,
    pub title: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_truncated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub score: f32,
    pub visibility: Visibility,
    pub created_by: Option<String>,
    pub has_correction: bool,
}

impl SearchResultItem {
    /// Truncates `content` to the preview window and sets the truncation
    /// flags when the full content exceeds it (§4.5).
    pub fn with_preview(mut self) -> Self {
        let len = self.content.chars().count();
        if len > CONTENT_PREVIEW_CHARS {
            self.content_length = Some(len);
            self.content_truncated = Some(true);
            self.content = self.content.chars().take(CONTENT_PREVIEW_CHARS).collect();
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPagination {
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub search_type: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    pub results: Vec<SearchResultItem>,
    pub pagination: SearchPagination,
}

pub mod search_type {
    pub const DIRECT_DB_QUERY: &str = "direct_db_query";
    pub const KEYWORD: &str = "keyword";
    pub const SEMANTIC: &str = "semantic";
    pub const HYBRID: &str = "hybrid";
    pub const HYBRID_KEYWORD: &str = "hybrid-keyword";
    pub const ENTITY: &str = "entity";
    pub const NLP: &str = "nlp";
}

/// Extracted constraints produced by the NLP heuristic pre-parser (§4.5),
/// then merged into a `SearchRequest` before dispatch.
#[derive(Debug, Clone, Default)]
pub struct NlpExtraction {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub type_hint: Option<String>,
    pub entity_hint: Option<String>,
    pub residual_query: String,
}

pub type ResultMetadata = Metadata;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_clamps_limit_to_valid_range() {
        let req = SearchRequest {
            query: "hello".into(),
            mode: SearchMode::Hybrid,
            filters: SearchFilters::default(),
            limit: 0,
            offset: 0,
        }
        .normalize();
        assert_eq!(req.limit, 1);

        let req = SearchRequest {
            query: "hello".into(),
            mode: SearchMode::Hybrid,
            filters: SearchFilters::default(),
            limit: 1000,
            offset: 0,
        }
        .normalize();
        assert_eq!(req.limit, 100);
    }

    #[test]
    fn test_with_preview_truncates_long_content() {
        let item = SearchResultItem {
            id: "m1".into(),
            title: None,
            content: "a".repeat(CONTENT_PREVIEW_CHARS + 50),
            content_truncated: None,
            content_length: None,
            tags: vec![],
            created_at: Utc::now(),
            score: 0.5,
            visibility: Visibility::Private,
            created_by: None,
            has_correction: false,
        }
        .with_preview();
        assert_eq!(item.content.chars().count(), CONTENT_PREVIEW_CHARS);
        assert_eq!(item.content_truncated, Some(true));
        assert_eq!(item.content_length, Some(CONTENT_PREVIEW_CHARS + 50));
    }

    #[test]
    fn test_with_preview_leaves_short_content_untouched() {
        let item = SearchResultItem {
            id: "m1".into(),
            title: None,
            content: "short".into(),
            content_truncated: None,
            content_length: None,
            tags: vec![],
            created_at: Utc::now(),
            score: 0.5,
            visibility: Visibility::Private,
            created_by: None,
            has_correction: false,
        }
        .with_preview();
        assert_eq!(item.content, "short");
        assert!(item.content_truncated.is_none());
    }
}
