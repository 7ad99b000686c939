use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{ExternalReference, ReferenceType};

pub struct ExternalReferenceRepository;

impl ExternalReferenceRepository {
    pub async fn create(conn: &Connection, reference: &ExternalReference) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO external_references (id, memory_id, reference_type, value, context, is_valid, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                reference.id.clone(),
                reference.memory_id.clone(),
                reference.reference_type.to_string(),
                reference.value.clone(),
                reference.context.clone(),
                reference.is_valid,
                reference.created_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_by_memory(conn: &Connection, memory_id: &str) -> Result<Vec<ExternalReference>> {
        let mut rows = conn
            .query(
                "SELECT id, memory_id, reference_type, value, context, is_valid, created_at \
                 FROM external_references WHERE memory_id = ?1 ORDER BY created_at ASC",
                params![memory_id],
            )
            .await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_reference(&row)?);
        }
        Ok(results)
    }

    fn row_to_reference(row: &libsql::Row) -> Result<ExternalReference> {
        let reference_type: String = row.get(2)?;
        let created_at: String = row.get(6)?;
        Ok(ExternalReference {
            id: row.get(0)?,
            memory_id: row.get(1)?,
            reference_type: reference_type.parse::<ReferenceType>().unwrap_or(ReferenceType::Url),
            value: row.get(3)?,
            context: row.get(4)?,
            is_valid: row.get(5)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
