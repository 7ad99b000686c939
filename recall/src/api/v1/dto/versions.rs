//! v1 version history DTOs (§4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChangeType, Metadata, MemoryVersion, VersionDiff};

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryVersionResponse {
    pub version_number: i64,
    pub content: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Metadata,
    pub changed_by: Option<String>,
    pub change_type: ChangeType,
    pub change_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MemoryVersion> for MemoryVersionResponse {
    fn from(v: MemoryVersion) -> Self {
        Self {
            version_number: v.version_number,
            content: v.content,
            title: v.title,
            tags: v.tags.into_iter().collect(),
            metadata: v.metadata,
            changed_by: v.changed_by,
            change_type: v.change_type,
            change_reason: v.change_reason,
            created_at: v.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionDiffResponse {
    pub from_version: i64,
    pub to_version: i64,
    pub content_changed: bool,
    pub title_changed: bool,
    pub tags_added: Vec<String>,
    pub tags_removed: Vec<String>,
    pub metadata_changed: bool,
}

impl From<VersionDiff> for VersionDiffResponse {
    fn from(d: VersionDiff) -> Self {
        Self {
            from_version: d.from_version,
            to_version: d.to_version,
            content_changed: d.content_changed,
            title_changed: d.title_changed,
            tags_added: d.tags_added,
            tags_removed: d.tags_removed,
            metadata_changed: d.metadata_changed,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, utoipa::ToSchema, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct CompareVersionsQuery {
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    pub change_reason: Option<String>,
}
