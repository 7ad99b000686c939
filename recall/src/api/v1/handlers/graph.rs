//! v1 knowledge graph handlers (§4.6).

use axum::extract::{Path, Query, State};

use crate::api::v1::dto::{EntitySearchQuery, EntitySearchResponse, NeighborhoodQuery, NeighborhoodResponse};
use crate::api::AppState;
use crate::error::{CoreError, Result};
use crate::graph;

/// `GET /api/v1/graph/entities/{name}/neighborhood`
#[utoipa::path(
    get,
    path = "/api/v1/graph/entities/{name}/neighborhood",
    tag = "graph",
    operation_id = "graph.neighborhood",
    params(
        ("name" = String, Path, description = "Entity name or alias"),
        NeighborhoodQuery,
    ),
    responses(
        (status = 200, description = "Entity neighborhood", body = NeighborhoodResponse),
        (status = 404, description = "Entity not found"),
    )
)]
pub async fn get_neighborhood(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<NeighborhoodQuery>,
) -> Result<crate::api::v1::response::ApiResponse<NeighborhoodResponse>> {
    let neighborhood = graph::neighborhood(state.db.as_ref(), &name, params.depth)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("entity '{name}' not found")))?;

    Ok(crate::api::v1::response::ApiResponse::success(neighborhood.into()))
}

/// `GET /api/v1/graph/entities`
#[utoipa::path(
    get,
    path = "/api/v1/graph/entities",
    tag = "graph",
    operation_id = "graph.searchEntities",
    params(EntitySearchQuery),
    responses(
        (status = 200, description = "Matching entities", body = EntitySearchResponse),
    )
)]
pub async fn search_entities(
    State(state): State<AppState>,
    Query(params): Query<EntitySearchQuery>,
) -> Result<crate::api::v1::response::ApiResponse<EntitySearchResponse>> {
    let entity_type = params.entity_type.as_deref().map(|s| s.parse().unwrap_or_default());
    let results = graph::search_entities(state.db.as_ref(), &params.q, entity_type, params.limit).await?;

    Ok(crate::api::v1::response::ApiResponse::success(EntitySearchResponse {
        results: results.iter().map(Into::into).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighborhood_query_defaults_depth() {
        let q: NeighborhoodQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.depth, 2);
    }
}
