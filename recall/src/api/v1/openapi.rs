use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::dto;
use super::handlers;
use super::response;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Recall API",
        version = "1.0.0",
        description = "Multi-tenant memory store with hybrid retrieval, a knowledge graph, deduplication, and versioning. Authentication is resolved upstream; this surface trusts the tenant/user/permissions it receives (see the request-surface docs).",
    ),
    paths(
        handlers::health::health_check,
        handlers::search::search,
        handlers::memories::create_memory,
        handlers::memories::get_memory,
        handlers::memories::update_memory,
        handlers::memories::delete_memory,
        handlers::memories::list_memories,
        handlers::memories::add_correction,
        handlers::memories::add_attachment,
        handlers::memories::add_attachment_from_url,
        handlers::memories::list_attachments,
        handlers::graph::get_neighborhood,
        handlers::graph::search_entities,
        handlers::versions::get_history,
        handlers::versions::get_version,
        handlers::versions::compare_versions,
        handlers::versions::rollback,
    ),
    components(schemas(
        // Response envelope
        response::ResponseMeta,
        response::OffsetPagination,
        // Memories
        dto::memories::CreateMemoryRequest,
        dto::memories::UpdateMemoryRequest,
        dto::memories::ListMemoriesQuery,
        dto::memories::CreateCorrectionRequest,
        dto::memories::AddAttachmentUrlRequest,
        dto::memories::MemoryResponse,
        dto::memories::MemoryWithEffectiveContentResponse,
        dto::memories::CreateMemoryResponse,
        dto::memories::CorrectionResponse,
        dto::memories::AttachmentResponse,
        // Search
        dto::search::SearchFiltersRequest,
        dto::search::SearchRequest,
        dto::search::SearchResultItemResponse,
        dto::search::SearchPaginationResponse,
        dto::search::SearchResponse,
        // Graph
        dto::graph::EntityResponse,
        dto::graph::NeighborEdgeResponse,
        dto::graph::NeighborhoodResponse,
        dto::graph::NeighborhoodQuery,
        dto::graph::EntitySearchQuery,
        dto::graph::EntitySearchResponse,
        // Versions
        dto::versions::MemoryVersionResponse,
        dto::versions::VersionDiffResponse,
        dto::versions::VersionHistoryQuery,
        dto::versions::CompareVersionsQuery,
        dto::versions::RollbackRequest,
        // Health (handler-local types)
        handlers::health::HealthData,
        handlers::health::DatabaseStatus,
        handlers::health::EmbeddingsStatus,
        handlers::health::LlmStatus,
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "memories", description = "Memory CRUD, corrections, and attachments"),
        (name = "search", description = "Hybrid retrieval across keyword, semantic, entity, and NLP modes"),
        (name = "graph", description = "Knowledge graph neighborhood traversal and entity search"),
        (name = "versions", description = "Version history, diffing, and rollback"),
    ),
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
