//! v1 memory handlers (§4.1, §4.9).

use axum::extract::{Extension, Path, State};
use axum_extra::extract::Query;

use crate::api::v1::dto::{
    AddAttachmentUrlRequest, AttachmentResponse, CreateCorrectionRequest, CreateMemoryRequest,
    CreateMemoryResponse, CorrectionResponse, ListMemoriesQuery, MemoryResponse,
    MemoryWithEffectiveContentResponse, UpdateMemoryRequest,
};
use crate::api::v1::response::{ApiResponse, ResponseMeta};
use crate::api::AppState;
use crate::error::{CoreError, Result};
use crate::models::RequestContext;
use crate::services::memory::CreateOptions;

/// `POST /api/v1/memories`
#[utoipa::path(
    post,
    path = "/api/v1/memories",
    tag = "memories",
    operation_id = "memories.create",
    request_body = CreateMemoryRequest,
    responses(
        (status = 201, description = "Memory created, duplicate found, or merged", body = CreateMemoryResponse),
        (status = 400, description = "Invalid request"),
    )
)]
pub async fn create_memory(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    axum::Json(req): axum::Json<CreateMemoryRequest>,
) -> Result<ApiResponse<CreateMemoryResponse>> {
    let force = req.force;
    let dedup_window_secs = req.dedup_window_secs;

    let options = CreateOptions {
        created_by: ctx.user_id.clone(),
        force,
        dedup_window_secs,
        ..CreateOptions::default()
    };

    let outcome = state.memory.create(&ctx.tenant_id, req.into(), options).await?;
    Ok(ApiResponse::created(CreateMemoryResponse::from(outcome)))
}

/// `GET /api/v1/memories/{memoryId}`
#[utoipa::path(
    get,
    path = "/api/v1/memories/{memoryId}",
    tag = "memories",
    operation_id = "memories.get",
    params(("memoryId" = String, Path, description = "Memory ID")),
    responses(
        (status = 200, description = "Memory found", body = MemoryWithEffectiveContentResponse),
        (status = 404, description = "Memory not found"),
    )
)]
pub async fn get_memory(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<ApiResponse<MemoryWithEffectiveContentResponse>> {
    let (memory, effective_content) = state.memory.get(&ctx, &id).await?;
    Ok(ApiResponse::success(MemoryWithEffectiveContentResponse {
        memory: memory.into(),
        effective_content,
    }))
}

/// `PATCH /api/v1/memories/{memoryId}`
#[utoipa::path(
    patch,
    path = "/api/v1/memories/{memoryId}",
    tag = "memories",
    operation_id = "memories.update",
    params(("memoryId" = String, Path, description = "Memory ID")),
    request_body = UpdateMemoryRequest,
    responses(
        (status = 200, description = "Memory updated", body = MemoryResponse),
        (status = 404, description = "Memory not found"),
    )
)]
pub async fn update_memory(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    axum::Json(req): axum::Json<UpdateMemoryRequest>,
) -> Result<ApiResponse<MemoryResponse>> {
    let regenerate_embedding = req.regenerate_embedding;
    let memory = state.memory.update(&ctx, &id, req.into(), regenerate_embedding).await?;
    Ok(ApiResponse::success(memory.into()))
}

/// `DELETE /api/v1/memories/{memoryId}`
#[utoipa::path(
    delete,
    path = "/api/v1/memories/{memoryId}",
    tag = "memories",
    operation_id = "memories.delete",
    params(("memoryId" = String, Path, description = "Memory ID")),
    responses(
        (status = 200, description = "Memory deleted"),
        (status = 404, description = "Memory not found"),
    )
)]
pub async fn delete_memory(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>> {
    state.memory.delete(&ctx, &id).await?;
    Ok(ApiResponse::success(()))
}

/// `GET /api/v1/memories`
#[utoipa::path(
    get,
    path = "/api/v1/memories",
    tag = "memories",
    operation_id = "memories.list",
    params(ListMemoriesQuery),
    responses(
        (status = 200, description = "Memories listed", body = [MemoryResponse]),
    )
)]
pub async fn list_memories(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ListMemoriesQuery>,
) -> Result<ApiResponse<Vec<MemoryResponse>>> {
    let memories = state.memory.list(&ctx, query.limit, query.offset).await?;
    let total = memories.len() as u64;
    let responses: Vec<MemoryResponse> = memories.into_iter().map(Into::into).collect();

    Ok(ApiResponse::success_with_meta(
        responses,
        ResponseMeta { next_cursor: None, total: Some(total) },
    ))
}

/// `POST /api/v1/memories/{memoryId}/corrections`
#[utoipa::path(
    post,
    path = "/api/v1/memories/{memoryId}/corrections",
    tag = "memories",
    operation_id = "memories.addCorrection",
    params(("memoryId" = String, Path, description = "Memory ID")),
    request_body = CreateCorrectionRequest,
    responses(
        (status = 201, description = "Correction recorded", body = CorrectionResponse),
        (status = 404, description = "Memory not found"),
    )
)]
pub async fn add_correction(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    axum::Json(req): axum::Json<CreateCorrectionRequest>,
) -> Result<ApiResponse<CorrectionResponse>> {
    let correction = state.memory.add_correction(&ctx, &id, req.corrected_content, req.reason).await?;
    Ok(ApiResponse::created(correction.into()))
}

/// `POST /api/v1/memories/{memoryId}/attachments`
///
/// Accepts a single-part file upload. `Content-Type` drives the stored
/// `mime_type`; the original filename must arrive via the `x-filename` header
/// since multipart parsing is out of scope for this simple byte-body form.
#[utoipa::path(
    post,
    path = "/api/v1/memories/{memoryId}/attachments",
    tag = "memories",
    operation_id = "memories.addAttachment",
    params(("memoryId" = String, Path, description = "Memory ID")),
    responses(
        (status = 201, description = "Attachment accepted for processing", body = AttachmentResponse),
        (status = 404, description = "Memory not found"),
    )
)]
pub async fn add_attachment(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    headers: axum::http::HeaderMap,
    bytes: axum::body::Bytes,
) -> Result<ApiResponse<AttachmentResponse>> {
    let filename = headers
        .get("x-filename")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| CoreError::Invalid("missing x-filename header".to_string()))?;
    let mime_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");

    let attachment = state.memory.add_attachment_bytes(&ctx, &id, filename, mime_type, &bytes).await?;
    Ok(ApiResponse::created(attachment.into()))
}

/// `POST /api/v1/memories/{memoryId}/attachments:fromUrl`
#[utoipa::path(
    post,
    path = "/api/v1/memories/{memoryId}/attachments:fromUrl",
    tag = "memories",
    operation_id = "memories.addAttachmentFromUrl",
    params(("memoryId" = String, Path, description = "Memory ID")),
    request_body = AddAttachmentUrlRequest,
    responses(
        (status = 201, description = "Attachment accepted for processing", body = AttachmentResponse),
        (status = 404, description = "Memory not found"),
    )
)]
pub async fn add_attachment_from_url(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    axum::Json(req): axum::Json<AddAttachmentUrlRequest>,
) -> Result<ApiResponse<AttachmentResponse>> {
    let attachment = state.memory.add_attachment_url(&ctx, &id, &req.url).await?;
    Ok(ApiResponse::created(attachment.into()))
}

/// `GET /api/v1/memories/{memoryId}/attachments`
#[utoipa::path(
    get,
    path = "/api/v1/memories/{memoryId}/attachments",
    tag = "memories",
    operation_id = "memories.listAttachments",
    params(("memoryId" = String, Path, description = "Memory ID")),
    responses(
        (status = 200, description = "Attachments listed", body = [AttachmentResponse]),
        (status = 404, description = "Memory not found"),
    )
)]
pub async fn list_attachments(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<AttachmentResponse>>> {
    let attachments = state.memory.list_attachments(&ctx, &id).await?;
    Ok(ApiResponse::success(attachments.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Memory;

    #[test]
    fn memory_response_from_domain_model() {
        let memory = Memory::new("mem_1".to_string(), "t1".to_string(), None, "hello".to_string());
        let resp: MemoryResponse = memory.into();
        assert_eq!(resp.id, "mem_1");
        assert_eq!(resp.content, "hello");
    }
}
