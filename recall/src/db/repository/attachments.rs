use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::db::repository::memories::format_vector;
use crate::error::Result;
use crate::models::{Attachment, LifecycleStatus, Metadata};

pub struct AttachmentRepository;

impl AttachmentRepository {
    pub async fn create(conn: &Connection, attachment: &Attachment) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO attachments (
                id, memory_id, filename, mime_type, file_size, file_hash, storage_path,
                upload_status, processing_status, extracted_text, extracted_metadata,
                content_description, thumbnail_path, embedding_model, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                attachment.id.clone(),
                attachment.memory_id.clone(),
                attachment.filename.clone(),
                attachment.mime_type.clone(),
                attachment.file_size,
                attachment.file_hash.clone(),
                attachment.storage_path.clone(),
                attachment.upload_status.to_string(),
                attachment.processing_status.to_string(),
                attachment.extracted_text.clone(),
                serde_json::to_string(&attachment.extracted_metadata)?,
                attachment.content_description.clone(),
                attachment.thumbnail_path.clone(),
                attachment.embedding_model.clone(),
                attachment.created_at.to_rfc3339(),
                attachment.updated_at.to_rfc3339(),
            ],
        )
        .await?;

        if let Some(embedding) = &attachment.content_embedding {
            conn.execute(
                "UPDATE attachments SET content_embedding = vector32(?2) WHERE id = ?1",
                params![attachment.id.clone(), format_vector(embedding)],
            )
            .await?;
        }

        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Attachment>> {
        let mut rows = conn.query(&format!("{} WHERE id = ?1", Self::select_clause()), params![id]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_attachment(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn get_by_hash(conn: &Connection, memory_id: &str, file_hash: &str) -> Result<Option<Attachment>> {
        let mut rows = conn
            .query(
                &format!("{} WHERE memory_id = ?1 AND file_hash = ?2", Self::select_clause()),
                params![memory_id, file_hash],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_attachment(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn get_by_memory(conn: &Connection, memory_id: &str) -> Result<Vec<Attachment>> {
        let mut rows = conn
            .query(
                &format!("{} WHERE memory_id = ?1 ORDER BY created_at ASC", Self::select_clause()),
                params![memory_id],
            )
            .await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_attachment(&row)?);
        }
        Ok(results)
    }

    pub async fn update(conn: &Connection, attachment: &Attachment) -> Result<()> {
        conn.execute(
            r#"
            UPDATE attachments SET
                upload_status = ?2, processing_status = ?3, extracted_text = ?4,
                extracted_metadata = ?5, content_description = ?6, thumbnail_path = ?7,
                embedding_model = ?8, updated_at = ?9
            WHERE id = ?1
            "#,
            params![
                attachment.id.clone(),
                attachment.upload_status.to_string(),
                attachment.processing_status.to_string(),
                attachment.extracted_text.clone(),
                serde_json::to_string(&attachment.extracted_metadata)?,
                attachment.content_description.clone(),
                attachment.thumbnail_path.clone(),
                attachment.embedding_model.clone(),
                attachment.updated_at.to_rfc3339(),
            ],
        )
        .await?;

        if let Some(embedding) = &attachment.content_embedding {
            conn.execute(
                "UPDATE attachments SET content_embedding = vector32(?2) WHERE id = ?1",
                params![attachment.id.clone(), format_vector(embedding)],
            )
            .await?;
        }

        Ok(())
    }

    pub async fn delete_by_memory(conn: &Connection, memory_id: &str) -> Result<u64> {
        conn.execute("DELETE FROM attachments WHERE memory_id = ?1", params![memory_id])
            .await
            .map_err(Into::into)
    }

    fn select_clause() -> &'static str {
        "SELECT id, memory_id, filename, mime_type, file_size, file_hash, storage_path, \
                upload_status, processing_status, extracted_text, extracted_metadata, \
                content_description, thumbnail_path, embedding_model, created_at, updated_at \
         FROM attachments"
    }

    fn row_to_attachment(row: &libsql::Row) -> Result<Attachment> {
        let upload_status: String = row.get(7)?;
        let processing_status: String = row.get(8)?;
        let extracted_metadata: String = row.get(10)?;
        let created_at: String = row.get(14)?;
        let updated_at: String = row.get(15)?;

        Ok(Attachment {
            id: row.get(0)?,
            memory_id: row.get(1)?,
            filename: row.get(2)?,
            mime_type: row.get(3)?,
            file_size: row.get(4)?,
            file_hash: row.get(5)?,
            storage_path: row.get(6)?,
            upload_status: upload_status.parse::<LifecycleStatus>().unwrap_or_default(),
            processing_status: processing_status.parse::<LifecycleStatus>().unwrap_or_default(),
            extracted_text: row.get(9)?,
            extracted_metadata: serde_json::from_str::<Metadata>(&extracted_metadata).unwrap_or_default(),
            content_description: row.get(11)?,
            thumbnail_path: row.get(12)?,
            content_embedding: None,
            embedding_model: row.get(13)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&updated_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
