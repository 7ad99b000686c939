use std::collections::HashSet;

use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{ChangeType, MemoryVersion, Metadata};

pub struct VersionRepository;

impl VersionRepository {
    pub async fn create(conn: &Connection, version: &MemoryVersion) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO memory_versions (
                memory_id, version_number, content, title, tags, metadata,
                changed_by, change_type, change_reason, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                version.memory_id.clone(),
                version.version_number,
                version.content.clone(),
                version.title.clone(),
                serde_json::to_string(&version.tags)?,
                serde_json::to_string(&version.metadata)?,
                version.changed_by.clone(),
                version.change_type.to_string(),
                version.change_reason.clone(),
                version.created_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_all(conn: &Connection, memory_id: &str) -> Result<Vec<MemoryVersion>> {
        let mut rows = conn
            .query(
                "SELECT memory_id, version_number, content, title, tags, metadata, changed_by, \
                        change_type, change_reason, created_at \
                 FROM memory_versions WHERE memory_id = ?1 ORDER BY version_number ASC",
                params![memory_id],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_version(&row)?);
        }
        Ok(results)
    }

    pub async fn get_one(conn: &Connection, memory_id: &str, version_number: i64) -> Result<Option<MemoryVersion>> {
        let mut rows = conn
            .query(
                "SELECT memory_id, version_number, content, title, tags, metadata, changed_by, \
                        change_type, change_reason, created_at \
                 FROM memory_versions WHERE memory_id = ?1 AND version_number = ?2",
                params![memory_id, version_number],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_version(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn prune(conn: &Connection, memory_id: &str, keep: u32) -> Result<()> {
        conn.execute(
            r#"
            DELETE FROM memory_versions
            WHERE memory_id = ?1
              AND version_number NOT IN (
                  SELECT version_number FROM memory_versions
                  WHERE memory_id = ?1
                  ORDER BY version_number DESC
                  LIMIT ?2
              )
            "#,
            params![memory_id, keep],
        )
        .await?;
        Ok(())
    }

    fn row_to_version(row: &libsql::Row) -> Result<MemoryVersion> {
        let tags: String = row.get(4)?;
        let metadata: String = row.get(5)?;
        let change_type: String = row.get(7)?;
        let created_at: String = row.get(9)?;

        Ok(MemoryVersion {
            memory_id: row.get(0)?,
            version_number: row.get(1)?,
            content: row.get(2)?,
            title: row.get(3)?,
            tags: serde_json::from_str::<HashSet<String>>(&tags).unwrap_or_default(),
            metadata: serde_json::from_str::<Metadata>(&metadata).unwrap_or_default(),
            changed_by: row.get(6)?,
            change_type: change_type.parse::<ChangeType>().unwrap_or(ChangeType::Update),
            change_reason: row.get(8)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
