use std::collections::HashSet;

use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{Memory, Metadata, Visibility};

pub struct MemoryRepository;

impl MemoryRepository {
    pub async fn create(conn: &Connection, memory: &Memory) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO memories (
                id, tenant_id, created_by, content, title, tags, metadata,
                visibility, current_version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                memory.id.clone(),
                memory.tenant_id.clone(),
                memory.created_by.clone(),
                memory.content.clone(),
                memory.title.clone(),
                serde_json::to_string(&memory.tags)?,
                serde_json::to_string(&memory.metadata)?,
                memory.visibility.to_string(),
                memory.current_version,
                memory.created_at.to_rfc3339(),
                memory.updated_at.to_rfc3339(),
            ],
        )
        .await?;

        if let Some(embedding) = &memory.embedding {
            Self::update_embedding(conn, &memory.id, embedding).await?;
        }

        Ok(())
    }

    pub async fn update_embedding(conn: &Connection, memory_id: &str, embedding: &[f32]) -> Result<()> {
        conn.execute(
            "UPDATE memories SET embedding = vector32(?2) WHERE id = ?1",
            params![memory_id, format_vector(embedding)],
        )
        .await?;
        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, tenant_id: &str, id: &str) -> Result<Option<Memory>> {
        let mut rows = conn
            .query(
                &format!("{} WHERE tenant_id = ?1 AND id = ?2", Self::select_clause()),
                params![tenant_id, id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_memory(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn get_by_ids(conn: &Connection, tenant_id: &str, ids: &[String]) -> Result<Vec<Memory>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (2..=ids.len() + 1).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "{} WHERE tenant_id = ?1 AND id IN ({placeholders})",
            Self::select_clause()
        );

        let mut query_params: Vec<libsql::Value> = vec![libsql::Value::from(tenant_id)];
        query_params.extend(ids.iter().map(|id| libsql::Value::from(id.clone())));

        let mut rows = conn.query(&sql, libsql::params_from_iter(query_params)).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_memory(&row)?);
        }
        Ok(results)
    }

    pub async fn update(conn: &Connection, memory: &Memory) -> Result<()> {
        conn.execute(
            r#"
            UPDATE memories SET
                content = ?3, title = ?4, tags = ?5, metadata = ?6,
                visibility = ?7, current_version = ?8, updated_at = ?9
            WHERE tenant_id = ?1 AND id = ?2
            "#,
            params![
                memory.tenant_id.clone(),
                memory.id.clone(),
                memory.content.clone(),
                memory.title.clone(),
                serde_json::to_string(&memory.tags)?,
                serde_json::to_string(&memory.metadata)?,
                memory.visibility.to_string(),
                memory.current_version,
                memory.updated_at.to_rfc3339(),
            ],
        )
        .await?;

        if let Some(embedding) = &memory.embedding {
            Self::update_embedding(conn, &memory.id, embedding).await?;
        }

        Ok(())
    }

    pub async fn delete(conn: &Connection, tenant_id: &str, id: &str) -> Result<bool> {
        let affected = conn
            .execute(
                "DELETE FROM memories WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, id],
            )
            .await?;
        Ok(affected > 0)
    }

    pub async fn list(conn: &Connection, tenant_id: &str, limit: u32, offset: u32) -> Result<Vec<Memory>> {
        let sql = format!(
            "{} WHERE tenant_id = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            Self::select_clause()
        );
        let mut rows = conn.query(&sql, params![tenant_id, limit, offset]).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_memory(&row)?);
        }
        Ok(results)
    }

    /// Fetches a bounded tenant-scoped candidate set for the keyword planner
    /// to score with trigram similarity in application code (§4.5, §9 — the
    /// one deliberate place ranking happens outside SQL because libsql has
    /// no trigram index type).
    pub async fn fetch_keyword_candidates(conn: &Connection, tenant_id: &str, limit: u32) -> Result<Vec<Memory>> {
        let sql = format!(
            "{} WHERE tenant_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            Self::select_clause()
        );
        let mut rows = conn.query(&sql, params![tenant_id, limit]).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_memory(&row)?);
        }
        Ok(results)
    }

    pub async fn search_similar(
        conn: &Connection,
        tenant_id: &str,
        embedding: &[f32],
        limit: u32,
        threshold: f32,
    ) -> Result<Vec<(Memory, f32)>> {
        let sql = format!(
            "{}, (1 - vector_distance_cos(embedding, vector32(?2))) AS similarity \
             FROM memories WHERE tenant_id = ?1 AND embedding IS NOT NULL \
             AND (1 - vector_distance_cos(embedding, vector32(?2))) >= ?3 \
             ORDER BY similarity DESC LIMIT ?4",
            Self::select_columns()
        );

        let mut rows = conn
            .query(&sql, params![tenant_id, format_vector(embedding), threshold, limit])
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            let memory = Self::row_to_memory(&row)?;
            let similarity: f64 = row.get(11)?;
            results.push((memory, similarity as f32));
        }
        Ok(results)
    }

    /// Candidate window for the Deduper's exact/near-duplicate checks (§4.4).
    pub async fn recent_for_dedup(conn: &Connection, tenant_id: &str, since: DateTime<Utc>) -> Result<Vec<Memory>> {
        let sql = format!(
            "{} WHERE tenant_id = ?1 AND created_at >= ?2 ORDER BY created_at DESC",
            Self::select_clause()
        );
        let mut rows = conn.query(&sql, params![tenant_id, since.to_rfc3339()]).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_memory(&row)?);
        }
        Ok(results)
    }

    fn select_columns() -> &'static str {
        "id, tenant_id, created_by, content, title, tags, metadata, visibility, current_version, created_at, updated_at"
    }

    fn select_clause() -> String {
        format!("SELECT {} FROM memories", Self::select_columns())
    }

    fn row_to_memory(row: &libsql::Row) -> Result<Memory> {
        let tags: String = row.get(5)?;
        let metadata: String = row.get(6)?;
        let visibility: String = row.get(7)?;
        let created_at: String = row.get(9)?;
        let updated_at: String = row.get(10)?;

        Ok(Memory {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            created_by: row.get(2)?,
            content: row.get(3)?,
            title: row.get(4)?,
            tags: serde_json::from_str::<HashSet<String>>(&tags).unwrap_or_default(),
            metadata: serde_json::from_str::<Metadata>(&metadata).unwrap_or_default(),
            visibility: visibility.parse::<Visibility>().unwrap_or_default(),
            embedding: None,
            current_version: row.get(8)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&updated_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

/// Renders an embedding as the bracketed float list `vector32()` expects.
pub fn format_vector(embedding: &[f32]) -> String {
    let joined = embedding.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
    format!("[{joined}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        crate::db::schema::init_schema(&conn).await.unwrap();
        conn.execute(
            "INSERT INTO tenants (id, slug, plan, max_file_size_bytes, created_at, updated_at) \
             VALUES ('t1', 'acme', 'free', 52428800, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            (),
        )
        .await
        .unwrap();
        conn
    }

    #[tokio::test]
    async fn test_create_and_get_by_id_roundtrip() {
        let conn = setup().await;
        let memory = Memory::new("m1".into(), "t1".into(), None, "hello world".into());
        MemoryRepository::create(&conn, &memory).await.unwrap();

        let fetched = MemoryRepository::get_by_id(&conn, "t1", "m1").await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello world");
        assert_eq!(fetched.tenant_id, "t1");
    }

    #[tokio::test]
    async fn test_get_by_id_is_tenant_scoped() {
        let conn = setup().await;
        let memory = Memory::new("m1".into(), "t1".into(), None, "hello".into());
        MemoryRepository::create(&conn, &memory).await.unwrap();

        let fetched = MemoryRepository::get_by_id(&conn, "t2", "m1").await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_created_at_desc() {
        let conn = setup().await;
        let mut older = Memory::new("m1".into(), "t1".into(), None, "first".into());
        older.created_at = chrono::Utc::now() - chrono::Duration::hours(1);
        let newer = Memory::new("m2".into(), "t1".into(), None, "second".into());
        MemoryRepository::create(&conn, &older).await.unwrap();
        MemoryRepository::create(&conn, &newer).await.unwrap();

        let results = MemoryRepository::list(&conn, "t1", 10, 0).await.unwrap();
        assert_eq!(results[0].id, "m2");
        assert_eq!(results[1].id, "m1");
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let conn = setup().await;
        let memory = Memory::new("m1".into(), "t1".into(), None, "hello".into());
        MemoryRepository::create(&conn, &memory).await.unwrap();

        assert!(MemoryRepository::delete(&conn, "t1", "m1").await.unwrap());
        assert!(MemoryRepository::get_by_id(&conn, "t1", "m1").await.unwrap().is_none());
    }
}
