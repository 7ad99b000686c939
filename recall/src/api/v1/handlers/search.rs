//! v1 search handler (§4.5).

use axum::extract::{Extension, State};

use crate::api::v1::dto::{SearchRequest, SearchResponse};
use crate::api::AppState;
use crate::error::Result;
use crate::models::RequestContext;

/// `POST /api/v1/search`
#[utoipa::path(
    post,
    path = "/api/v1/search",
    tag = "search",
    operation_id = "search.search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search results", body = SearchResponse),
        (status = 400, description = "Invalid request"),
    )
)]
pub async fn search(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    axum::Json(req): axum::Json<SearchRequest>,
) -> Result<crate::api::v1::response::ApiResponse<SearchResponse>> {
    let response = state.search.search(&ctx, req.into()).await?;
    Ok(crate::api::v1::response::ApiResponse::success(response.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_request_defaults_mode_to_hybrid() {
        let req: SearchRequest = serde_json::from_str(r#"{"query":"test query"}"#).unwrap();
        assert_eq!(req.mode, crate::models::SearchMode::Hybrid);
    }
}
