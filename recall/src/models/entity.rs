use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{EntityType, Metadata};

/// Globally addressable by case-folded name or alias match; never deleted
/// once created (§3). Re-observation increments `occurrence_count` and
/// updates `last_seen` in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    pub aliases: HashSet<String>,
    pub attributes: Metadata,
    pub occurrence_count: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Entity {
    pub fn new(id: String, name: String, entity_type: EntityType) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            entity_type,
            aliases: HashSet::new(),
            attributes: Metadata::new(),
            occurrence_count: 1,
            first_seen: now,
            last_seen: now,
            embedding: None,
        }
    }

    /// Case-folded key used for alias/name lookup (§3: "addressable by
    /// case-folded name or alias match").
    pub fn lookup_key(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    /// Merges a re-observation into this entity: union the aliases, bump the
    /// occurrence count, and advance `last_seen`. Matches the historical
    /// system's alias-union / occurrence-increment semantics.
    pub fn observe(&mut self, new_aliases: impl IntoIterator<Item = String>) {
        self.aliases.extend(new_aliases);
        self.occurrence_count += 1;
        self.last_seen = Utc::now();
    }
}
