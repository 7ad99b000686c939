use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LifecycleStatus, Metadata};

/// Owned 1:N by Memory; deleting the memory deletes its attachments (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub memory_id: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub file_hash: String,
    pub storage_path: String,
    pub upload_status: LifecycleStatus,
    pub processing_status: LifecycleStatus,
    pub extracted_text: Option<String>,
    pub extracted_metadata: Metadata,
    pub content_description: Option<String>,
    pub thumbnail_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_embedding: Option<Vec<f32>>,
    pub embedding_model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attachment {
    pub fn new(
        id: String,
        memory_id: String,
        filename: String,
        mime_type: String,
        file_size: i64,
        file_hash: String,
        storage_path: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            memory_id,
            filename,
            mime_type,
            file_size,
            file_hash,
            storage_path,
            upload_status: LifecycleStatus::Pending,
            processing_status: LifecycleStatus::Pending,
            extracted_text: None,
            extracted_metadata: Metadata::new(),
            content_description: None,
            thumbnail_path: None,
            content_embedding: None,
            embedding_model: None,
            created_at: now,
            updated_at: now,
        }
    }
}
