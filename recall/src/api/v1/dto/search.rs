//! v1 search DTOs (§4.5). Thin camelCase wire wrappers around the
//! five-mode `models::search` types; the planner itself lives in
//! `services::search`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{SearchFilters, SearchMode, SearchRequest as DomainSearchRequest, SearchResponse as DomainSearchResponse, SearchResultItem as DomainSearchResultItem, Visibility};

#[derive(Debug, Clone, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchFiltersRequest {
    #[serde(default)]
    pub tags: Vec<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub visibility: Vec<Visibility>,
    pub user: Option<String>,
}

impl From<SearchFiltersRequest> for SearchFilters {
    fn from(f: SearchFiltersRequest) -> Self {
        Self { tags: f.tags, date_from: f.date_from, date_to: f.date_to, visibility: f.visibility, user: f.user }
    }
}

/// `POST /api/v1/search` request body.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub filters: SearchFiltersRequest,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

impl From<SearchRequest> for DomainSearchRequest {
    fn from(req: SearchRequest) -> Self {
        Self { query: req.query, mode: req.mode, filters: req.filters.into(), limit: req.limit, offset: req.offset }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItemResponse {
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

impl From<DomainSearchResultItem> for SearchResultItemResponse {
    fn from(item: DomainSearchResultItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
            content: item.content,
            content_truncated: item.content_truncated,
            content_length: item.content_length,
            tags: item.tags,
            created_at: item.created_at,
            score: item.score,
            visibility: item.visibility,
            created_by: item.created_by,
            has_correction: item.has_correction,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchPaginationResponse {
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

/// `POST /api/v1/search` response body.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub search_type: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    pub results: Vec<SearchResultItemResponse>,
    pub pagination: SearchPaginationResponse,
}

impl From<DomainSearchResponse> for SearchResponse {
    fn from(resp: DomainSearchResponse) -> Self {
        Self {
            query: resp.query,
            search_type: resp.search_type,
            count: resp.count,
            total: resp.total,
            results: resp.results.into_iter().map(Into::into).collect(),
            pagination: SearchPaginationResponse {
                limit: resp.pagination.limit,
                offset: resp.pagination.offset,
                has_more: resp.pagination.has_more,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_request_defaults_mode_to_hybrid() {
        let req: SearchRequest = serde_json::from_str(r#"{"query":"hello"}"#).unwrap();
        assert_eq!(req.mode, SearchMode::Hybrid);
        assert_eq!(req.limit, 20);
    }

    #[test]
    fn search_request_accepts_camel_case_filters() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"query":"hello","filters":{"dateFrom":"2024-01-01T00:00:00Z"}}"#).unwrap();
        assert!(req.filters.date_from.is_some());
    }
}
