//! Knowledge graph operations (§4.6). Entities are global and never deleted;
//! relations are unique on (from, to, type) with confidence merged as
//! `max(old, new)` on re-observation. The repository layer
//! (`db/repository/entities.rs`) already owns the find-or-create and
//! merge-on-conflict SQL; this module is the validation/normalization seam
//! between the raw, unnormalized output of `extraction::Extractor` and that
//! repository: entity_type is case-folded and coerced to `other` if unknown,
//! relation_type is lowercased and snake-cased, confidence is clamped to
//! `[0,1]`, and empty names are dropped before anything reaches the store.

use std::collections::HashSet;

use uuid::Uuid;

use crate::db::DatabaseBackend;
use crate::error::Result;
use crate::extraction::{ExtractedEntity, ExtractedRelation, ExtractionResult};
use crate::models::{Entity, EntityType, MemoryEntityAssociation, Relation};

const MAX_NEIGHBORHOOD_DEPTH: u32 = 5;

/// One hop in a `neighborhood` traversal.
#[derive(Debug, Clone)]
pub struct NeighborEdge {
    pub from_entity_id: String,
    pub to_entity_id: String,
    pub relation_type: String,
    pub confidence: f32,
    pub depth: u32,
}

/// Bounded BFS result around a central entity.
#[derive(Debug, Clone)]
pub struct Neighborhood {
    pub central: Entity,
    pub nodes: Vec<Entity>,
    pub edges: Vec<NeighborEdge>,
}

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub entities_linked: usize,
    pub relations_created: usize,
}

/// Validates and upserts one extracted entity, returning the resolved,
/// globally-addressable `Entity` (merged into an existing row if its
/// case-folded name or an alias already exists). Returns `Ok(None)` for a
/// blank name rather than erroring — callers iterating a batch should skip
/// and continue.
pub async fn upsert_entity(db: &dyn DatabaseBackend, extracted: &ExtractedEntity) -> Result<Option<Entity>> {
    let name = extracted.name.trim();
    if name.is_empty() {
        return Ok(None);
    }

    let entity_type: EntityType = extracted.entity_type.parse().unwrap_or_default();
    let mut entity = Entity::new(Uuid::new_v4().to_string(), name.to_string(), entity_type);
    entity.aliases = extracted.aliases.iter().map(|alias| alias.trim().to_string()).filter(|alias| !alias.is_empty()).collect();
    entity.attributes = extracted.attributes.clone();

    db.upsert_entity(&entity).await?;
    db.find_entity_by_name_or_alias(&Entity::lookup_key(name)).await
}

/// Validates and upserts one extracted relation between two entities that
/// must already exist in the graph. Returns `Ok(None)` when either endpoint
/// is unresolved, the relation type normalizes to empty, or the two names
/// are identical — these are dropped, not errors (§4.6).
pub async fn create_relation(
    db: &dyn DatabaseBackend,
    extracted: &ExtractedRelation,
    source_memory_id: Option<&str>,
) -> Result<Option<Relation>> {
    let from_name = extracted.from.trim();
    let to_name = extracted.to.trim();
    if from_name.is_empty() || to_name.is_empty() {
        return Ok(None);
    }

    let relation_type = Relation::normalize_type(&extracted.relation_type);
    if relation_type.is_empty() {
        return Ok(None);
    }

    let from_entity = db.find_entity_by_name_or_alias(&Entity::lookup_key(from_name)).await?;
    let to_entity = db.find_entity_by_name_or_alias(&Entity::lookup_key(to_name)).await?;
    let (Some(from_entity), Some(to_entity)) = (from_entity, to_entity) else {
        tracing::debug!(from = from_name, to = to_name, "cannot create relation: endpoint entity not found");
        return Ok(None);
    };

    if from_entity.id == to_entity.id {
        return Ok(None);
    }

    let relation = Relation {
        id: Uuid::new_v4().to_string(),
        from_entity_id: from_entity.id.clone(),
        to_entity_id: to_entity.id.clone(),
        relation_type: relation_type.clone(),
        attributes: extracted.attributes.clone(),
        confidence: extracted.confidence.clamp(0.0, 1.0),
        source_memory_id: source_memory_id.map(str::to_string),
        created_at: chrono::Utc::now(),
    };

    db.upsert_relation(&relation).await?;
    db.get_relation(&from_entity.id, &to_entity.id, &relation_type).await
}

/// Links a memory to an already-resolved entity with a relevance score
/// (§4.6: upsert on `(memory_id, entity_id)`, overwriting the score).
pub async fn associate(db: &dyn DatabaseBackend, memory_id: &str, entity_id: &str, relevance_score: f32) -> Result<()> {
    let assoc = MemoryEntityAssociation {
        memory_id: memory_id.to_string(),
        entity_id: entity_id.to_string(),
        relevance_score: relevance_score.clamp(0.0, 1.0),
    };
    db.associate_memory_entity(&assoc).await
}

/// Ingests a full `ExtractionResult` for one memory: upserts every entity,
/// associates each with the memory at its extracted confidence, then upserts
/// every relation whose endpoints resolved. This is what the task queue's
/// `extract_entities` handler calls after fetching a memory's content (§4.7).
pub async fn ingest(db: &dyn DatabaseBackend, memory_id: &str, extraction: &ExtractionResult) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for extracted in &extraction.entities {
        let Some(entity) = upsert_entity(db, extracted).await? else {
            continue;
        };
        associate(db, memory_id, &entity.id, extracted.confidence).await?;
        summary.entities_linked += 1;
    }

    for extracted in &extraction.relations {
        if create_relation(db, extracted, Some(memory_id)).await?.is_some() {
            summary.relations_created += 1;
        }
    }

    tracing::debug!(
        memory_id,
        entities_linked = summary.entities_linked,
        relations_created = summary.relations_created,
        "ingested extraction result into knowledge graph"
    );

    Ok(summary)
}

/// Bounded breadth-first traversal around `entity_name`, at most
/// `depth` hops (clamped to `MAX_NEIGHBORHOOD_DEPTH`) with a single visited
/// set shared across the whole walk — a node reached at one depth is never
/// re-expanded at a deeper one, and this is never a 1-hop shortcut regardless
/// of what a shallower implementation might have done (§4.6, §9).
pub async fn neighborhood(db: &dyn DatabaseBackend, entity_name: &str, depth: u32) -> Result<Option<Neighborhood>> {
    let depth = depth.min(MAX_NEIGHBORHOOD_DEPTH);

    let Some(central) = db.find_entity_by_name_or_alias(&Entity::lookup_key(entity_name)).await? else {
        return Ok(None);
    };

    let mut visited_entities: HashSet<String> = HashSet::from([central.id.clone()]);
    let mut visited_relations: HashSet<String> = HashSet::new();
    let mut nodes = vec![central.clone()];
    let mut edges = Vec::new();
    let mut frontier = vec![central.id.clone()];

    for current_depth in 1..=depth {
        if frontier.is_empty() {
            break;
        }
        let mut next_frontier = Vec::new();

        for entity_id in &frontier {
            for relation in db.get_relations_for_entity(entity_id).await? {
                if !visited_relations.insert(relation.id.clone()) {
                    continue;
                }

                let neighbor_id =
                    if relation.from_entity_id == *entity_id { relation.to_entity_id.clone() } else { relation.from_entity_id.clone() };

                edges.push(NeighborEdge {
                    from_entity_id: relation.from_entity_id.clone(),
                    to_entity_id: relation.to_entity_id.clone(),
                    relation_type: relation.relation_type.clone(),
                    confidence: relation.confidence,
                    depth: current_depth,
                });

                if visited_entities.insert(neighbor_id.clone()) {
                    if let Some(entity) = db.get_entity_by_id(&neighbor_id).await? {
                        nodes.push(entity);
                    }
                    next_frontier.push(neighbor_id);
                }
            }
        }

        frontier = next_frontier;
    }

    Ok(Some(Neighborhood { central, nodes, edges }))
}

/// Full-text entity search over name and alias, optionally filtered to one
/// `EntityType` and ordered by `occurrence_count DESC` (§4.6). The store's
/// search has no type column in its index, so when a type filter is given we
/// over-fetch and filter in Rust, the same trade-off already made for
/// keyword/trigram search.
pub async fn search_entities(db: &dyn DatabaseBackend, query: &str, entity_type: Option<EntityType>, limit: u32) -> Result<Vec<Entity>> {
    let fetch_limit = if entity_type.is_some() { limit.saturating_mul(4).max(limit) } else { limit };
    let mut results = db.search_entities(query, fetch_limit).await?;

    if let Some(entity_type) = entity_type {
        results.retain(|entity| entity.entity_type == entity_type);
    }
    results.truncate(limit as usize);

    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{Database, LibSqlBackend};
    use crate::models::Metadata;

    fn test_config() -> DatabaseConfig {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let thread_id = std::thread::current().id();
        DatabaseConfig {
            url: format!("file:/tmp/recall_graph_test_{thread_id:?}_{timestamp}?mode=memory&cache=shared"),
            auth_token: None,
            local_path: None,
            busy_timeout_ms: 5000,
            journal_mode: "WAL".into(),
            synchronous: "NORMAL".into(),
            pool_min: 1,
            pool_max: 4,
            acquire_retries: 3,
        }
    }

    async fn test_backend() -> Arc<dyn DatabaseBackend> {
        let db = Database::new(&test_config()).await.expect("failed to create database");
        Arc::new(LibSqlBackend::new(db))
    }

    fn extracted_entity(name: &str, entity_type: &str) -> ExtractedEntity {
        ExtractedEntity {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            aliases: Vec::new(),
            attributes: Metadata::new(),
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn upsert_entity_drops_blank_name() {
        let db = test_backend().await;
        let result = upsert_entity(&*db, &extracted_entity("   ", "person")).await.expect("should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn upsert_entity_coerces_unknown_type_to_other() {
        let db = test_backend().await;
        let entity = upsert_entity(&*db, &extracted_entity("Acme Corp", "spaceship"))
            .await
            .expect("should not error")
            .expect("entity should be created");
        assert_eq!(entity.entity_type, EntityType::Other);
    }

    #[tokio::test]
    async fn upsert_entity_merges_on_repeated_name() {
        let db = test_backend().await;
        let first = upsert_entity(&*db, &extracted_entity("Acme Corp", "organization")).await.expect("ok").expect("created");
        let second = upsert_entity(&*db, &extracted_entity("acme corp", "organization")).await.expect("ok").expect("merged");

        assert_eq!(first.id, second.id);
        assert_eq!(second.occurrence_count, 2);
    }

    #[tokio::test]
    async fn create_relation_drops_when_endpoint_missing() {
        let db = test_backend().await;
        upsert_entity(&*db, &extracted_entity("Ada Lovelace", "person")).await.expect("ok");

        let extracted = ExtractedRelation {
            from: "Ada Lovelace".to_string(),
            to: "Analytical Engine".to_string(),
            relation_type: "designed".to_string(),
            attributes: Metadata::new(),
            confidence: 0.8,
        };

        let relation = create_relation(&*db, &extracted, Some("mem_1")).await.expect("should not error");
        assert!(relation.is_none());
    }

    #[tokio::test]
    async fn create_relation_normalizes_type_and_clamps_confidence() {
        let db = test_backend().await;
        upsert_entity(&*db, &extracted_entity("Ada Lovelace", "person")).await.expect("ok");
        upsert_entity(&*db, &extracted_entity("Analytical Engine", "technology")).await.expect("ok");

        let extracted = ExtractedRelation {
            from: "Ada Lovelace".to_string(),
            to: "Analytical Engine".to_string(),
            relation_type: "Designed By".to_string(),
            attributes: Metadata::new(),
            confidence: 1.4,
        };

        let relation = create_relation(&*db, &extracted, Some("mem_1")).await.expect("should not error").expect("relation created");
        assert_eq!(relation.relation_type, "designed_by");
        assert_eq!(relation.confidence, 1.0);
    }

    #[tokio::test]
    async fn neighborhood_walks_bounded_bfs() {
        let db = test_backend().await;
        upsert_entity(&*db, &extracted_entity("A", "person")).await.expect("ok");
        upsert_entity(&*db, &extracted_entity("B", "person")).await.expect("ok");
        upsert_entity(&*db, &extracted_entity("C", "person")).await.expect("ok");

        let rel_ab = ExtractedRelation { from: "A".into(), to: "B".into(), relation_type: "knows".into(), attributes: Metadata::new(), confidence: 0.9 };
        let rel_bc = ExtractedRelation { from: "B".into(), to: "C".into(), relation_type: "knows".into(), attributes: Metadata::new(), confidence: 0.9 };
        create_relation(&*db, &rel_ab, None).await.expect("ok");
        create_relation(&*db, &rel_bc, None).await.expect("ok");

        let one_hop = neighborhood(&*db, "A", 1).await.expect("ok").expect("entity found");
        assert_eq!(one_hop.nodes.len(), 2); // A, B
        assert_eq!(one_hop.edges.len(), 1);

        let two_hop = neighborhood(&*db, "A", 2).await.expect("ok").expect("entity found");
        assert_eq!(two_hop.nodes.len(), 3); // A, B, C
        assert_eq!(two_hop.edges.len(), 2);
    }

    #[tokio::test]
    async fn neighborhood_returns_none_for_unknown_entity() {
        let db = test_backend().await;
        let result = neighborhood(&*db, "Nobody", 2).await.expect("should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn ingest_links_entities_and_relations() {
        let db = test_backend().await;

        let extraction = ExtractionResult {
            entities: vec![extracted_entity("Ada Lovelace", "person"), extracted_entity("Analytical Engine", "technology")],
            relations: vec![ExtractedRelation {
                from: "Ada Lovelace".into(),
                to: "Analytical Engine".into(),
                relation_type: "designed".into(),
                attributes: Metadata::new(),
                confidence: 0.8,
            }],
        };

        let summary = ingest(&*db, "mem_1", &extraction).await.expect("ingest should not fail");
        assert_eq!(summary.entities_linked, 2);
        assert_eq!(summary.relations_created, 1);
    }

    #[tokio::test]
    async fn search_entities_filters_by_type_in_rust() {
        let db = test_backend().await;
        upsert_entity(&*db, &extracted_entity("Acme Corp", "organization")).await.expect("ok");
        upsert_entity(&*db, &extracted_entity("Acme Park", "location")).await.expect("ok");

        let results = search_entities(&*db, "acme", Some(EntityType::Organization), 10).await.expect("should not error");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Acme Corp");
    }
}
