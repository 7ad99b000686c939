use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::Correction;

pub struct CorrectionRepository;

impl CorrectionRepository {
    pub async fn create(conn: &Connection, correction: &Correction) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO corrections (
                id, memory_id, corrected_content, original_content_snapshot,
                reason, corrected_by, corrected_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                correction.id.clone(),
                correction.memory_id.clone(),
                correction.corrected_content.clone(),
                correction.original_content_snapshot.clone(),
                correction.reason.clone(),
                correction.corrected_by.clone(),
                correction.corrected_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_all(conn: &Connection, memory_id: &str) -> Result<Vec<Correction>> {
        let mut rows = conn
            .query(
                "SELECT id, memory_id, corrected_content, original_content_snapshot, \
                        reason, corrected_by, corrected_at \
                 FROM corrections WHERE memory_id = ?1 ORDER BY corrected_at ASC",
                params![memory_id],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_correction(&row)?);
        }
        Ok(results)
    }

    pub async fn get_latest(conn: &Connection, memory_id: &str) -> Result<Option<Correction>> {
        let mut rows = conn
            .query(
                "SELECT id, memory_id, corrected_content, original_content_snapshot, \
                        reason, corrected_by, corrected_at \
                 FROM corrections WHERE memory_id = ?1 ORDER BY corrected_at DESC LIMIT 1",
                params![memory_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_correction(&row)?))
        } else {
            Ok(None)
        }
    }

    fn row_to_correction(row: &libsql::Row) -> Result<Correction> {
        let corrected_at: String = row.get(6)?;
        Ok(Correction {
            id: row.get(0)?,
            memory_id: row.get(1)?,
            corrected_content: row.get(2)?,
            original_content_snapshot: row.get(3)?,
            reason: row.get(4)?,
            corrected_by: row.get(5)?,
            corrected_at: DateTime::parse_from_rfc3339(&corrected_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
