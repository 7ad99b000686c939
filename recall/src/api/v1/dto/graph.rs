//! v1 knowledge graph DTOs (§4.6).

use serde::{Deserialize, Serialize};

use crate::graph::{NeighborEdge, Neighborhood};
use crate::models::Entity;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityResponse {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub aliases: Vec<String>,
    pub occurrence_count: i64,
    pub first_seen: chrono::DateTime<chrono::Utc>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

impl From<&Entity> for EntityResponse {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            name: entity.name.clone(),
            entity_type: entity.entity_type.to_string(),
            aliases: entity.aliases.iter().cloned().collect(),
            occurrence_count: entity.occurrence_count,
            first_seen: entity.first_seen,
            last_seen: entity.last_seen,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NeighborEdgeResponse {
    pub from_entity_id: String,
    pub to_entity_id: String,
    pub relation_type: String,
    pub confidence: f32,
    pub depth: u32,
}

impl From<&NeighborEdge> for NeighborEdgeResponse {
    fn from(edge: &NeighborEdge) -> Self {
        Self {
            from_entity_id: edge.from_entity_id.clone(),
            to_entity_id: edge.to_entity_id.clone(),
            relation_type: edge.relation_type.clone(),
            confidence: edge.confidence,
            depth: edge.depth,
        }
    }
}

/// `GET /api/v1/graph/entities/{name}/neighborhood` response body (§4.6).
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodResponse {
    pub central: EntityResponse,
    pub nodes: Vec<EntityResponse>,
    pub edges: Vec<NeighborEdgeResponse>,
    pub total_connections: usize,
}

impl From<Neighborhood> for NeighborhoodResponse {
    fn from(neighborhood: Neighborhood) -> Self {
        let total_connections = neighborhood.edges.len();
        Self {
            central: EntityResponse::from(&neighborhood.central),
            nodes: neighborhood.nodes.iter().map(EntityResponse::from).collect(),
            edges: neighborhood.edges.iter().map(NeighborEdgeResponse::from).collect(),
            total_connections,
        }
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodQuery {
    #[serde(default = "default_depth")]
    pub depth: u32,
}

fn default_depth() -> u32 {
    2
}

impl Default for NeighborhoodQuery {
    fn default() -> Self {
        Self { depth: default_depth() }
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct EntitySearchQuery {
    pub q: String,
    pub entity_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct EntitySearchResponse {
    pub results: Vec<EntityResponse>,
}
