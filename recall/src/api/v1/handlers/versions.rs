//! v1 version history handlers (§4.10).

use axum::extract::{Extension, Path, Query, State};

use crate::api::v1::dto::{
    CompareVersionsQuery, MemoryVersionResponse, MemoryResponse, RollbackRequest,
    VersionDiffResponse, VersionHistoryQuery,
};
use crate::api::AppState;
use crate::error::Result;
use crate::models::RequestContext;

/// `GET /api/v1/memories/{memoryId}/versions`
#[utoipa::path(
    get,
    path = "/api/v1/memories/{memoryId}/versions",
    tag = "versions",
    operation_id = "versions.history",
    params(
        ("memoryId" = String, Path, description = "Memory ID"),
        VersionHistoryQuery,
    ),
    responses(
        (status = 200, description = "Version history, newest first", body = [MemoryVersionResponse]),
        (status = 404, description = "Memory not found"),
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Query(query): Query<VersionHistoryQuery>,
) -> Result<crate::api::v1::response::ApiResponse<Vec<MemoryVersionResponse>>> {
    let versions = state.versioning.get_version_history(&ctx, &id, query.limit).await?;
    Ok(crate::api::v1::response::ApiResponse::success(versions.into_iter().map(Into::into).collect()))
}

/// `GET /api/v1/memories/{memoryId}/versions/{versionNumber}`
#[utoipa::path(
    get,
    path = "/api/v1/memories/{memoryId}/versions/{versionNumber}",
    tag = "versions",
    operation_id = "versions.get",
    params(
        ("memoryId" = String, Path, description = "Memory ID"),
        ("versionNumber" = i64, Path, description = "Version number"),
    ),
    responses(
        (status = 200, description = "Version found", body = MemoryVersionResponse),
        (status = 404, description = "Version not found"),
    )
)]
pub async fn get_version(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, version_number)): Path<(String, i64)>,
) -> Result<crate::api::v1::response::ApiResponse<MemoryVersionResponse>> {
    let version = state.versioning.get_specific_version(&ctx, &id, version_number).await?;
    Ok(crate::api::v1::response::ApiResponse::success(version.into()))
}

/// `GET /api/v1/memories/{memoryId}/versions:compare`
#[utoipa::path(
    get,
    path = "/api/v1/memories/{memoryId}/versions:compare",
    tag = "versions",
    operation_id = "versions.compare",
    params(
        ("memoryId" = String, Path, description = "Memory ID"),
        CompareVersionsQuery,
    ),
    responses(
        (status = 200, description = "Field-level diff between two versions", body = VersionDiffResponse),
        (status = 404, description = "Version not found"),
    )
)]
pub async fn compare_versions(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Query(query): Query<CompareVersionsQuery>,
) -> Result<crate::api::v1::response::ApiResponse<VersionDiffResponse>> {
    let diff = state.versioning.compare_versions(&ctx, &id, query.from, query.to).await?;
    Ok(crate::api::v1::response::ApiResponse::success(diff.into()))
}

/// `POST /api/v1/memories/{memoryId}/versions/{versionNumber}:rollback`
#[utoipa::path(
    post,
    path = "/api/v1/memories/{memoryId}/versions/{versionNumber}:rollback",
    tag = "versions",
    operation_id = "versions.rollback",
    params(
        ("memoryId" = String, Path, description = "Memory ID"),
        ("versionNumber" = i64, Path, description = "Target version number"),
    ),
    request_body = RollbackRequest,
    responses(
        (status = 200, description = "Memory rolled back, appended as a new version", body = MemoryResponse),
        (status = 404, description = "Version not found"),
    )
)]
pub async fn rollback(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, version_number)): Path<(String, i64)>,
    axum::Json(req): axum::Json<RollbackRequest>,
) -> Result<crate::api::v1::response::ApiResponse<MemoryResponse>> {
    let memory = state.versioning.rollback(&ctx, &id, version_number, req.change_reason).await?;
    Ok(crate::api::v1::response::ApiResponse::success(memory.into()))
}
