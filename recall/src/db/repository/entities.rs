use std::collections::HashSet;

use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::db::repository::memories::format_vector;
use crate::error::Result;
use crate::models::{Entity, EntityType, Memory, Metadata, Relation, Visibility};

pub struct EntityRepository;

impl EntityRepository {
    /// Inserts a brand-new entity row, or merges into an existing one keyed
    /// by `name_key` — union aliases, bump `occurrence_count`, advance
    /// `last_seen` — mirroring `Entity::observe` (§4.6).
    pub async fn upsert(conn: &Connection, entity: &Entity) -> Result<Entity> {
        let name_key = Entity::lookup_key(&entity.name);

        if let Some(mut existing) = Self::find_by_name_key(conn, &name_key).await? {
            existing.observe(entity.aliases.iter().cloned());
            for (k, v) in entity.attributes.iter() {
                existing.attributes.entry(k.clone()).or_insert_with(|| v.clone());
            }
            Self::update(conn, &existing).await?;
            return Ok(existing);
        }

        conn.execute(
            r#"
            INSERT INTO entities (
                id, name, name_key, entity_type, aliases, attributes,
                occurrence_count, first_seen, last_seen
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                entity.id.clone(),
                entity.name.clone(),
                name_key,
                entity.entity_type.to_string(),
                serde_json::to_string(&entity.aliases)?,
                serde_json::to_string(&entity.attributes)?,
                entity.occurrence_count,
                entity.first_seen.to_rfc3339(),
                entity.last_seen.to_rfc3339(),
            ],
        )
        .await?;

        if let Some(embedding) = &entity.embedding {
            conn.execute(
                "UPDATE entities SET embedding = vector32(?2) WHERE id = ?1",
                params![entity.id.clone(), format_vector(embedding)],
            )
            .await?;
        }

        Ok(entity.clone())
    }

    async fn update(conn: &Connection, entity: &Entity) -> Result<()> {
        conn.execute(
            r#"
            UPDATE entities SET
                aliases = ?2, attributes = ?3, occurrence_count = ?4, last_seen = ?5
            WHERE id = ?1
            "#,
            params![
                entity.id.clone(),
                serde_json::to_string(&entity.aliases)?,
                serde_json::to_string(&entity.attributes)?,
                entity.occurrence_count,
                entity.last_seen.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Entity>> {
        let mut rows = conn.query(&format!("{} WHERE id = ?1", Self::select_clause()), params![id]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_entity(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn find_by_name_key(conn: &Connection, name_key: &str) -> Result<Option<Entity>> {
        let mut rows = conn
            .query(&format!("{} WHERE name_key = ?1", Self::select_clause()), params![name_key])
            .await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_entity(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn search(conn: &Connection, query: &str, limit: u32) -> Result<Vec<Entity>> {
        let pattern = format!("%{}%", query.to_lowercase());
        let sql = format!(
            "{} WHERE name_key LIKE ?1 ORDER BY occurrence_count DESC LIMIT ?2",
            Self::select_clause()
        );
        let mut rows = conn.query(&sql, params![pattern, limit]).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_entity(&row)?);
        }
        Ok(results)
    }

    pub async fn upsert_relation(conn: &Connection, relation: &Relation) -> Result<Relation> {
        let normalized_type = Relation::normalize_type(&relation.relation_type);

        if let Some(mut existing) = Self::get_relation(conn, &relation.from_entity_id, &relation.to_entity_id, &normalized_type).await? {
            existing.confidence = Relation::merge_confidence(existing.confidence, relation.confidence);
            for (k, v) in relation.attributes.iter() {
                existing.attributes.entry(k.clone()).or_insert_with(|| v.clone());
            }
            conn.execute(
                "UPDATE relations SET confidence = ?2, attributes = ?3 WHERE id = ?1",
                params![
                    existing.id.clone(),
                    existing.confidence,
                    serde_json::to_string(&existing.attributes)?,
                ],
            )
            .await?;
            return Ok(existing);
        }

        conn.execute(
            r#"
            INSERT INTO relations (
                id, from_entity_id, to_entity_id, relation_type, attributes,
                confidence, source_memory_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                relation.id.clone(),
                relation.from_entity_id.clone(),
                relation.to_entity_id.clone(),
                normalized_type.clone(),
                serde_json::to_string(&relation.attributes)?,
                relation.confidence,
                relation.source_memory_id.clone(),
                relation.created_at.to_rfc3339(),
            ],
        )
        .await?;

        let mut stored = relation.clone();
        stored.relation_type = normalized_type;
        Ok(stored)
    }

    pub async fn get_relation(conn: &Connection, from: &str, to: &str, relation_type: &str) -> Result<Option<Relation>> {
        let mut rows = conn
            .query(
                &format!(
                    "{} WHERE from_entity_id = ?1 AND to_entity_id = ?2 AND relation_type = ?3",
                    Self::relation_select_clause()
                ),
                params![from, to, relation_type],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_relation(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn get_relations_for_entity(conn: &Connection, entity_id: &str) -> Result<Vec<Relation>> {
        let sql = format!(
            "{} WHERE from_entity_id = ?1 OR to_entity_id = ?1",
            Self::relation_select_clause()
        );
        let mut rows = conn.query(&sql, params![entity_id]).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_relation(&row)?);
        }
        Ok(results)
    }

    pub async fn associate_memory_entity(conn: &Connection, memory_id: &str, entity_id: &str, relevance_score: f32) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO memory_entity_associations (memory_id, entity_id, relevance_score)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(memory_id, entity_id) DO UPDATE SET relevance_score = excluded.relevance_score
            "#,
            params![memory_id, entity_id, relevance_score],
        )
        .await?;
        Ok(())
    }

    pub async fn delete_associations_by_memory(conn: &Connection, memory_id: &str) -> Result<u64> {
        conn.execute(
            "DELETE FROM memory_entity_associations WHERE memory_id = ?1",
            params![memory_id],
        )
        .await
        .map_err(Into::into)
    }

    pub async fn get_entities_for_memory(conn: &Connection, memory_id: &str) -> Result<Vec<(Entity, f32)>> {
        let sql = format!(
            "SELECT a.relevance_score, {} FROM memory_entity_associations a \
             JOIN entities e ON e.id = a.entity_id \
             WHERE a.memory_id = ?1 ORDER BY a.relevance_score DESC",
            Self::select_columns_prefixed("e")
        );
        let mut rows = conn.query(&sql, params![memory_id]).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            let relevance: f64 = row.get(0)?;
            let entity = Self::row_to_entity_offset(&row, 1)?;
            results.push((entity, relevance as f32));
        }
        Ok(results)
    }

    pub async fn get_memories_for_entity(
        conn: &Connection,
        tenant_id: &str,
        entity_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<(Memory, f32)>> {
        let sql = format!(
            "SELECT a.relevance_score, m.id, m.tenant_id, m.created_by, m.content, m.title, m.tags, \
                    m.metadata, m.visibility, m.current_version, m.created_at, m.updated_at \
             FROM memory_entity_associations a \
             JOIN memories m ON m.id = a.memory_id \
             WHERE a.entity_id = ?1 AND m.tenant_id = ?2 \
             ORDER BY a.relevance_score DESC, m.created_at DESC LIMIT ?3 OFFSET ?4"
        );
        let mut rows = conn.query(&sql, params![entity_id, tenant_id, limit, offset]).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            let relevance: f64 = row.get(0)?;
            let tags: String = row.get(6)?;
            let metadata: String = row.get(7)?;
            let visibility: String = row.get(8)?;
            let created_at: String = row.get(10)?;
            let updated_at: String = row.get(11)?;
            let memory = Memory {
                id: row.get(1)?,
                tenant_id: row.get(2)?,
                created_by: row.get(3)?,
                content: row.get(4)?,
                title: row.get(5)?,
                tags: serde_json::from_str::<HashSet<String>>(&tags).unwrap_or_default(),
                metadata: serde_json::from_str::<Metadata>(&metadata).unwrap_or_default(),
                visibility: visibility.parse::<Visibility>().unwrap_or_default(),
                embedding: None,
                current_version: row.get(9)?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                updated_at: DateTime::parse_from_rfc3339(&updated_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            };
            results.push((memory, relevance as f32));
        }
        Ok(results)
    }

    fn select_columns() -> &'static str {
        "id, name, name_key, entity_type, aliases, attributes, occurrence_count, first_seen, last_seen"
    }

    fn select_columns_prefixed(alias: &str) -> String {
        Self::select_columns()
            .split(", ")
            .map(|c| format!("{alias}.{c}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select_clause() -> String {
        format!("SELECT {} FROM entities", Self::select_columns())
    }

    fn relation_select_clause() -> &'static str {
        "SELECT id, from_entity_id, to_entity_id, relation_type, attributes, confidence, source_memory_id, created_at FROM relations"
    }

    fn row_to_entity(row: &libsql::Row) -> Result<Entity> {
        Self::row_to_entity_offset(row, 0)
    }

    fn row_to_entity_offset(row: &libsql::Row, offset: i32) -> Result<Entity> {
        let entity_type: String = row.get(offset + 3)?;
        let aliases: String = row.get(offset + 4)?;
        let attributes: String = row.get(offset + 5)?;
        let first_seen: String = row.get(offset + 7)?;
        let last_seen: String = row.get(offset + 8)?;

        Ok(Entity {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            entity_type: entity_type.parse::<EntityType>().unwrap_or_default(),
            aliases: serde_json::from_str::<HashSet<String>>(&aliases).unwrap_or_default(),
            attributes: serde_json::from_str::<Metadata>(&attributes).unwrap_or_default(),
            occurrence_count: row.get(offset + 6)?,
            first_seen: DateTime::parse_from_rfc3339(&first_seen)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            last_seen: DateTime::parse_from_rfc3339(&last_seen)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            embedding: None,
        })
    }

    fn row_to_relation(row: &libsql::Row) -> Result<Relation> {
        let attributes: String = row.get(4)?;
        let created_at: String = row.get(7)?;
        Ok(Relation {
            id: row.get(0)?,
            from_entity_id: row.get(1)?,
            to_entity_id: row.get(2)?,
            relation_type: row.get(3)?,
            attributes: serde_json::from_str::<Metadata>(&attributes).unwrap_or_default(),
            confidence: {
                let c: f64 = row.get(5)?;
                c as f32
            },
            source_memory_id: row.get(6)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
