//! v1 memory request/response DTOs (§4.1, §4.9, §4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::{Attachment, Correction, Memory, Metadata, Visibility};
use crate::models::{CreateMemoryRequest as DomainCreateMemoryRequest, UpdateMemoryRequest as DomainUpdateMemoryRequest};
use crate::services::memory::CreateOutcome;

/// `POST /api/v1/memories` request body.
#[derive(Debug, Clone, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemoryRequest {
    pub content: String,
    pub title: Option<String>,
    #[serde(default)]
    pub tags: HashSet<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub visibility: Option<Visibility>,
    /// Bypasses the Deduper's near-duplicate check (§4.4).
    #[serde(default)]
    pub force: bool,
    /// Overrides `tenancy.dedup_window_secs` for this call.
    pub dedup_window_secs: Option<u64>,
}

impl From<CreateMemoryRequest> for DomainCreateMemoryRequest {
    fn from(req: CreateMemoryRequest) -> Self {
        Self { content: req.content, title: req.title, tags: req.tags, metadata: req.metadata, visibility: req.visibility }
    }
}

/// `PATCH /api/v1/memories/{memoryId}` request body.
#[derive(Debug, Clone, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemoryRequest {
    pub content: Option<String>,
    pub title: Option<String>,
    pub tags: Option<HashSet<String>>,
    pub metadata: Option<Metadata>,
    pub visibility: Option<Visibility>,
    pub change_reason: Option<String>,
    #[serde(default)]
    pub regenerate_embedding: bool,
}

impl From<UpdateMemoryRequest> for DomainUpdateMemoryRequest {
    fn from(req: UpdateMemoryRequest) -> Self {
        Self {
            content: req.content,
            title: req.title,
            tags: req.tags,
            metadata: req.metadata,
            visibility: req.visibility,
            change_reason: req.change_reason,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, utoipa::ToSchema, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListMemoriesQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCorrectionRequest {
    pub corrected_content: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryResponse {
    pub id: String,
    pub content: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Metadata,
    pub visibility: Visibility,
    pub version: i64,
    pub has_embedding: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Memory> for MemoryResponse {
    fn from(memory: Memory) -> Self {
        Self {
            id: memory.id,
            content: memory.content,
            title: memory.title,
            tags: memory.tags.into_iter().collect(),
            metadata: memory.metadata,
            visibility: memory.visibility,
            version: memory.current_version,
            has_embedding: memory.embedding.is_some(),
            created_by: memory.created_by,
            created_at: memory.created_at,
            updated_at: memory.updated_at,
        }
    }
}

/// `GET /api/v1/memories/{memoryId}` response: `content` reflects the
/// latest correction, if any (§3's `effective_content`).
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryWithEffectiveContentResponse {
    #[serde(flatten)]
    pub memory: MemoryResponse,
    pub effective_content: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CreateMemoryResponse {
    Created { memory: MemoryResponse },
    DuplicateFound { existing: MemoryResponse, similarity: f32 },
    Merged { memory: MemoryResponse },
}

impl From<CreateOutcome> for CreateMemoryResponse {
    fn from(outcome: CreateOutcome) -> Self {
        match outcome {
            CreateOutcome::Created(memory) => Self::Created { memory: memory.into() },
            CreateOutcome::DuplicateFound { existing, similarity } => {
                Self::DuplicateFound { existing: existing.into(), similarity }
            }
            CreateOutcome::Merged(memory) => Self::Merged { memory: memory.into() },
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionResponse {
    pub id: String,
    pub memory_id: String,
    pub corrected_content: String,
    pub reason: Option<String>,
    pub corrected_by: Option<String>,
    pub corrected_at: DateTime<Utc>,
}

impl From<Correction> for CorrectionResponse {
    fn from(c: Correction) -> Self {
        Self {
            id: c.id,
            memory_id: c.memory_id,
            corrected_content: c.corrected_content,
            reason: c.reason,
            corrected_by: c.corrected_by,
            corrected_at: c.corrected_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentResponse {
    pub id: String,
    pub memory_id: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub upload_status: String,
    pub processing_status: String,
    pub content_description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Attachment> for AttachmentResponse {
    fn from(a: Attachment) -> Self {
        Self {
            id: a.id,
            memory_id: a.memory_id,
            filename: a.filename,
            mime_type: a.mime_type,
            file_size: a.file_size,
            upload_status: a.upload_status.to_string(),
            processing_status: a.processing_status.to_string(),
            content_description: a.content_description,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddAttachmentUrlRequest {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_memory_request_deserializes_minimal() {
        let req: CreateMemoryRequest = serde_json::from_str(r#"{"content":"hello"}"#).unwrap();
        assert_eq!(req.content, "hello");
        assert!(!req.force);
        assert!(req.tags.is_empty());
    }

    #[test]
    fn list_memories_query_defaults() {
        let query: ListMemoriesQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 20);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn memory_response_from_domain_model() {
        let memory = Memory::new("m1".into(), "t1".into(), Some("u1".into()), "hello".into());
        let resp = MemoryResponse::from(memory);
        assert_eq!(resp.id, "m1");
        assert_eq!(resp.version, 1);
        assert!(!resp.has_embedding);
    }

    #[test]
    fn create_memory_response_tags_created_variant() {
        let memory = Memory::new("m1".into(), "t1".into(), None, "hello".into());
        let outcome = CreateOutcome::Created(memory);
        let json = serde_json::to_value(CreateMemoryResponse::from(outcome)).unwrap();
        assert_eq!(json["status"], "created");
    }
}
